//! Error types surfaced by the inspector.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use varscope_config::ConfigError;

use crate::connector::ConnectorError;
use crate::message::RequestId;
use crate::payload::{KernelError, PayloadError};

/// Operation being executed when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectorOperation {
    /// Running the initialisation script.
    Initialise,
    /// Subscribing to the broadcast channel.
    Subscribe,
    /// Plain variable inspection.
    Inspect,
    /// Table inspection of a single variable.
    MatrixInspect,
    /// Deleting a variable.
    Delete,
}

impl fmt::Display for InspectorOperation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Initialise => "initialisation",
            Self::Subscribe => "broadcast subscription",
            Self::Inspect => "inspection",
            Self::MatrixInspect => "matrix inspection",
            Self::Delete => "delete",
        };
        formatter.write_str(label)
    }
}

/// Errors returned by inspectors.
#[derive(Debug, Error)]
pub enum InspectorError {
    /// The inspector configuration is unusable.
    #[error("invalid inspector configuration: {0}")]
    Config(#[from] ConfigError),

    /// The inspector has been disposed.
    #[error("cannot run {operation}: the inspector has been disposed")]
    Disposed {
        /// Operation that was attempted.
        operation: InspectorOperation,
    },

    /// The operation is not available for this kernel.
    #[error("{operation} is unsupported: {reason}")]
    Unsupported {
        /// Operation that was attempted.
        operation: InspectorOperation,
        /// Why it is unavailable.
        reason: String,
    },

    /// The connector failed to accept the request.
    #[error("connector failed during {operation}: {source}")]
    Connector {
        /// Operation that failed.
        operation: InspectorOperation,
        /// Underlying error.
        #[source]
        source: ConnectorError,
    },

    /// The kernel answered with an error reply.
    #[error("kernel error during {operation}: {error}")]
    Kernel {
        /// Operation that failed.
        operation: InspectorOperation,
        /// Error reported by the kernel.
        error: KernelError,
    },

    /// The kernel answered with text that could not be decoded.
    #[error("malformed kernel payload during {operation}: {source}")]
    MalformedPayload {
        /// Operation that failed.
        operation: InspectorOperation,
        /// Decoding failure.
        #[source]
        source: PayloadError,
    },

    /// The reply stream ended without a terminal reply.
    #[error("reply stream for {operation} ended without a result")]
    Abandoned {
        /// Operation that was waiting.
        operation: InspectorOperation,
    },

    /// No terminal reply arrived in time.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Operation that was waiting.
        operation: InspectorOperation,
        /// How long the caller waited.
        timeout: Duration,
    },
}

impl InspectorError {
    pub(crate) const fn disposed(operation: InspectorOperation) -> Self {
        Self::Disposed { operation }
    }

    pub(crate) fn unsupported(operation: InspectorOperation, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) const fn connector(operation: InspectorOperation, source: ConnectorError) -> Self {
        Self::Connector { operation, source }
    }

    pub(crate) const fn kernel(operation: InspectorOperation, error: KernelError) -> Self {
        Self::Kernel { operation, error }
    }

    pub(crate) const fn malformed(operation: InspectorOperation, source: PayloadError) -> Self {
        Self::MalformedPayload { operation, source }
    }
}

/// Non-fatal failure published on an inspector's failure signal.
///
/// Plain inspection never surfaces errors to callers directly; hosts that
/// want to show them subscribe to failures instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionFailure {
    /// Operation that failed.
    pub operation: InspectorOperation,
    /// Request the failure belongs to, when known.
    pub request: Option<RequestId>,
    /// Human-readable description.
    pub message: String,
}

impl InspectionFailure {
    pub(crate) fn new(
        operation: InspectorOperation,
        request: Option<RequestId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            request,
            message: message.into(),
        }
    }
}
