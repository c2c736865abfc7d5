//! Fallback inspector for kernels without a configured profile.

use std::sync::atomic::{AtomicBool, Ordering};

use flume::Receiver;
use serde_json::Value;
use tracing::debug;
use varscope_config::UNSUPPORTED_LANGUAGE_CONTEXT;

use crate::errors::{InspectionFailure, InspectorError, InspectorOperation};
use crate::handler::INSPECTOR_TARGET;
use crate::inspector::VariableInspector;
use crate::matrix::MatrixRequest;
use crate::signal::Signal;
use crate::update::{InspectionTitle, InspectionUpdate};

/// Inspector that never talks to the kernel.
///
/// Each inspection publishes an empty variable list whose title explains
/// that the language is not supported, so the display surface has something
/// to render.
pub struct UnsupportedInspector {
    kernel_name: String,
    disposed_flag: AtomicBool,
    inspected: Signal<InspectionUpdate>,
    disposed: Signal<()>,
    failures: Signal<InspectionFailure>,
}

impl UnsupportedInspector {
    /// Builds a fallback inspector for the named kernel.
    #[must_use]
    pub fn new(kernel_name: impl Into<String>) -> Self {
        Self {
            kernel_name: kernel_name.into(),
            disposed_flag: AtomicBool::new(false),
            inspected: Signal::new(),
            disposed: Signal::new(),
            failures: Signal::new(),
        }
    }
}

impl VariableInspector for UnsupportedInspector {
    fn perform_inspection(&self) -> Result<(), InspectorError> {
        if self.is_disposed() {
            return Err(InspectorError::disposed(InspectorOperation::Inspect));
        }
        let title = InspectionTitle {
            kernel_name: self.kernel_name.clone(),
            context_name: UNSUPPORTED_LANGUAGE_CONTEXT.to_owned(),
        };
        self.inspected
            .emit(&InspectionUpdate::new(title, Value::Array(Vec::new())));
        Ok(())
    }

    fn perform_matrix_inspection(&self, name: &str) -> MatrixRequest {
        debug!(
            target: INSPECTOR_TARGET,
            kernel = %self.kernel_name,
            variable = name,
            "matrix inspection requested for an unsupported language"
        );
        MatrixRequest::rejected(InspectorError::unsupported(
            InspectorOperation::MatrixInspect,
            "the kernel language has no inspector profile",
        ))
    }

    fn perform_delete(&self, _name: &str) -> Result<(), InspectorError> {
        Err(InspectorError::unsupported(
            InspectorOperation::Delete,
            "the kernel language has no inspector profile",
        ))
    }

    fn subscribe_inspected(&self) -> Receiver<InspectionUpdate> {
        self.inspected.subscribe()
    }

    fn subscribe_disposed(&self) -> Receiver<()> {
        self.disposed.subscribe()
    }

    fn subscribe_failures(&self) -> Receiver<InspectionFailure> {
        self.failures.subscribe()
    }

    fn dispose(&self) {
        if self.disposed_flag.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inspected.close();
        self.failures.close();
        self.disposed.emit(&());
        self.disposed.close();
    }

    fn is_disposed(&self) -> bool {
        self.disposed_flag.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for UnsupportedInspector {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("UnsupportedInspector")
            .field("kernel", &self.kernel_name)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
