//! Behaviour shared by every inspector exposed to display surfaces.

use flume::Receiver;

use crate::errors::{InspectionFailure, InspectorError};
use crate::matrix::MatrixRequest;
use crate::update::InspectionUpdate;

/// Interface a display surface uses to drive variable inspection.
///
/// Updates, failures and the disposal notice are delivered on `flume`
/// receivers. After disposal every receiver is disconnected and new
/// subscriptions return already-disconnected receivers.
pub trait VariableInspector: Send + Sync {
    /// Requests a fresh variable listing. Fire-and-forget: the update, if
    /// any, arrives on [`VariableInspector::subscribe_inspected`].
    ///
    /// # Errors
    ///
    /// Fails when the inspector is disposed or the request cannot be
    /// submitted.
    fn perform_inspection(&self) -> Result<(), InspectorError>;

    /// Requests a table view of the variable `name`.
    ///
    /// `name` is spliced into the submitted code verbatim and must be a
    /// valid identifier in the kernel language.
    fn perform_matrix_inspection(&self, name: &str) -> MatrixRequest;

    /// Deletes the variable `name` from the kernel namespace.
    ///
    /// # Errors
    ///
    /// Fails when deletion is not configured, the inspector is disposed,
    /// or the request cannot be submitted.
    fn perform_delete(&self, name: &str) -> Result<(), InspectorError>;

    /// Subscribes to inspection updates.
    fn subscribe_inspected(&self) -> Receiver<InspectionUpdate>;

    /// Subscribes to the one-off disposal notice.
    fn subscribe_disposed(&self) -> Receiver<()>;

    /// Subscribes to non-fatal inspection failures.
    fn subscribe_failures(&self) -> Receiver<InspectionFailure>;

    /// Disposes the inspector. Repeated calls are no-ops.
    fn dispose(&self);

    /// Whether the inspector has been disposed.
    fn is_disposed(&self) -> bool;
}
