//! Tabular model built from a kernel table description.
//!
//! Kernels describe a variable's contents using the JSON table schema layout
//! (`{"schema": {"fields": [...], "primaryKey": [...]}, "data": [...]}`).
//! Primary-key fields become row headers; every other field is a body column.

use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::errors::{InspectorError, InspectorOperation};
use crate::message::RequestId;
use crate::payload::PayloadError;

/// One column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TableField {
    /// Column name, also the key used in each data row.
    pub name: String,
    /// Declared column type, e.g. `integer` or `string`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
}

/// Column layout of a table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TableSchema {
    /// Columns in display order.
    pub fields: Vec<TableField>,
    /// Columns that identify a row; rendered as row headers.
    #[serde(
        rename = "primaryKey",
        default,
        deserialize_with = "deserialize_primary_key"
    )]
    pub primary_key: Vec<String>,
}

/// Row and column option set returned by a matrix query.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TableOptions {
    /// Column layout.
    pub schema: TableSchema,
    /// Rows keyed by column name.
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PrimaryKey {
    One(String),
    Many(Vec<String>),
}

fn deserialize_primary_key<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<PrimaryKey>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(PrimaryKey::One(key)) => vec![key],
        Some(PrimaryKey::Many(keys)) => keys,
    })
}

/// Area of the table a cell belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRegion {
    /// Data cells.
    Body,
    /// Primary-key cells at the start of each row.
    RowHeader,
    /// Column names above the body.
    ColumnHeader,
    /// Primary-key column names above the row headers.
    CornerHeader,
}

/// Read-only table built from [`TableOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixModel {
    options: TableOptions,
    body_columns: Vec<String>,
    header_columns: Vec<String>,
}

impl MatrixModel {
    /// Builds a model from a decoded option set.
    #[must_use]
    pub fn new(options: TableOptions) -> Self {
        let header_columns = options.schema.primary_key.clone();
        let body_columns = options
            .schema
            .fields
            .iter()
            .map(|field| field.name.clone())
            .filter(|name| !header_columns.contains(name))
            .collect();
        Self {
            options,
            body_columns,
            header_columns,
        }
    }

    /// Builds a model from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidTable`] when `value` is not a table
    /// description.
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        serde_json::from_value(value)
            .map(Self::new)
            .map_err(|source| PayloadError::InvalidTable { source })
    }

    /// The option set the model was built from.
    #[must_use]
    pub const fn options(&self) -> &TableOptions {
        &self.options
    }

    /// Number of rows in `region`.
    #[must_use]
    pub fn row_count(&self, region: CellRegion) -> usize {
        match region {
            CellRegion::Body | CellRegion::RowHeader => self.options.data.len(),
            CellRegion::ColumnHeader | CellRegion::CornerHeader => 1,
        }
    }

    /// Number of columns in `region`.
    #[must_use]
    pub fn column_count(&self, region: CellRegion) -> usize {
        match region {
            CellRegion::Body | CellRegion::ColumnHeader => self.body_columns.len(),
            CellRegion::RowHeader | CellRegion::CornerHeader => self.header_columns.len(),
        }
    }

    /// Value of the cell at `row`/`column` in `region`, if it exists.
    #[must_use]
    pub fn cell(&self, region: CellRegion, row: usize, column: usize) -> Option<Value> {
        match region {
            CellRegion::Body => self.row_value(row, self.body_columns.get(column)?),
            CellRegion::RowHeader => self.row_value(row, self.header_columns.get(column)?),
            CellRegion::ColumnHeader => Self::header_name(&self.body_columns, row, column),
            CellRegion::CornerHeader => Self::header_name(&self.header_columns, row, column),
        }
    }

    fn row_value(&self, row: usize, column: &str) -> Option<Value> {
        self.options.data.get(row)?.get(column).cloned()
    }

    fn header_name(columns: &[String], row: usize, column: usize) -> Option<Value> {
        if row != 0 {
            return None;
        }
        columns.get(column).cloned().map(Value::String)
    }
}

type MatrixOutcome = Result<MatrixModel, InspectorError>;

/// Pending result of a matrix inspection.
///
/// Settles once with a model or an error. When the connector drops the reply
/// callback without a terminal reply the request reports
/// [`InspectorError::Abandoned`]; when it keeps the callback forever the
/// request never settles.
#[derive(Debug)]
pub struct MatrixRequest {
    request: Option<RequestId>,
    receiver: Receiver<MatrixOutcome>,
}

impl MatrixRequest {
    pub(crate) fn pending(request: RequestId) -> (MatrixSettler, Self) {
        let (sender, receiver) = flume::bounded(1);
        (
            MatrixSettler {
                sender: Some(sender),
            },
            Self {
                request: Some(request),
                receiver,
            },
        )
    }

    pub(crate) fn rejected(error: InspectorError) -> Self {
        let (sender, receiver) = flume::bounded(1);
        let mut settler = MatrixSettler {
            sender: Some(sender),
        };
        settler.settle(Err(error));
        Self {
            request: None,
            receiver,
        }
    }

    /// Request the result belongs to; `None` when rejected before submission.
    #[must_use]
    pub const fn request_id(&self) -> Option<RequestId> {
        self.request
    }

    /// Blocks until the request settles.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason, or [`InspectorError::Abandoned`].
    pub fn wait(self) -> MatrixOutcome {
        self.receiver.recv().unwrap_or_else(|_| Err(abandoned()))
    }

    /// Blocks until the request settles or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason, [`InspectorError::Abandoned`], or
    /// [`InspectorError::Timeout`].
    pub fn wait_timeout(self, timeout: Duration) -> MatrixOutcome {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(InspectorError::Timeout {
                operation: InspectorOperation::MatrixInspect,
                timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(abandoned()),
        }
    }

    /// Takes the outcome if the request has settled.
    #[must_use]
    pub fn try_take(&self) -> Option<MatrixOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(abandoned())),
        }
    }

    /// Waits asynchronously until the request settles.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason, or [`InspectorError::Abandoned`].
    pub async fn wait_async(self) -> MatrixOutcome {
        self.receiver
            .recv_async()
            .await
            .unwrap_or_else(|_| Err(abandoned()))
    }
}

const fn abandoned() -> InspectorError {
    InspectorError::Abandoned {
        operation: InspectorOperation::MatrixInspect,
    }
}

/// Sending half of a [`MatrixRequest`]; settles it at most once.
#[derive(Debug)]
pub(crate) struct MatrixSettler {
    sender: Option<Sender<MatrixOutcome>>,
}

impl MatrixSettler {
    pub(crate) const fn is_settled(&self) -> bool {
        self.sender.is_none()
    }

    /// Delivers `outcome`. Later calls are ignored.
    pub(crate) fn settle(&mut self, outcome: MatrixOutcome) {
        if let Some(sender) = self.sender.take()
            && sender.send(outcome).is_err()
        {
            tracing::debug!(
                target: crate::handler::INSPECTOR_TARGET,
                "matrix result dropped; the caller no longer waits for it"
            );
        }
    }
}
