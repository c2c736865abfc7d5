//! BDD test world encapsulating an inspector and its fake connector.

use flume::Receiver;
use varscope_config::InspectorConfig;

use crate::errors::InspectorError;
use crate::handler::{InspectorState, KernelInspector};
use crate::inspector::VariableInspector;
use crate::matrix::{MatrixModel, MatrixRequest};
use crate::update::InspectionUpdate;

use super::fake_connector::FakeConnector;
use super::pending_inspector;

/// Shared state exercised by BDD step implementations.
pub struct TestWorld {
    /// Connector the inspector talks to.
    pub connector: FakeConnector,
    /// Inspector under test.
    pub inspector: KernelInspector,
    /// Receiver attached to the inspected signal at construction.
    pub updates: Receiver<InspectionUpdate>,
    /// Receiver attached to the disposed signal at construction.
    pub disposals: Receiver<()>,
    /// Outstanding matrix request, if any.
    pub matrix: Option<MatrixRequest>,
    /// Settled matrix outcome, if any.
    pub matrix_outcome: Option<Result<MatrixModel, InspectorError>>,
    /// Last error returned by a direct call.
    pub last_error: Option<InspectorError>,
}

impl TestWorld {
    /// Builds a world around a freshly constructed inspector.
    #[must_use]
    pub fn new(config: InspectorConfig) -> Self {
        let (connector, inspector) = pending_inspector(config);
        let updates = inspector.subscribe_inspected();
        let disposals = inspector.subscribe_disposed();
        Self {
            connector,
            inspector,
            updates,
            disposals,
            matrix: None,
            matrix_outcome: None,
            last_error: None,
        }
    }

    /// Current inspector state.
    #[must_use]
    pub fn state(&self) -> InspectorState {
        self.inspector.state()
    }

    /// Drains every update received so far.
    #[must_use]
    pub fn drain_updates(&self) -> Vec<InspectionUpdate> {
        self.updates.try_iter().collect()
    }

    /// Resolves the outstanding matrix request without blocking.
    pub fn settle_matrix(&mut self) {
        let request = self
            .matrix
            .take()
            .unwrap_or_else(|| panic!("no matrix request outstanding"));
        self.matrix_outcome = request.try_take();
    }
}
