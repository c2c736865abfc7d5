//! Abstractions over the transport that talks to a running kernel.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::message::{ExecuteRequest, KernelMessage};

/// Invoked once when the kernel connection becomes usable.
pub type ReadyCallback = Box<dyn FnOnce() + Send>;

/// Invoked once per reply message produced for a submitted request.
pub type ReplyCallback = Box<dyn FnMut(&KernelMessage) + Send>;

/// Invoked once when a submitted request has finished executing.
pub type CompletionCallback = Box<dyn FnOnce(Result<(), ConnectorError>) + Send>;

/// Receives every broadcast message together with the sending session.
pub type BroadcastListener = Arc<dyn Fn(&str, &KernelMessage) + Send + Sync>;

/// Handle identifying one broadcast subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wraps a connector-assigned identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Errors reported by connector implementations.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConnectorError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl ConnectorError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-friendly description without the optional source.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Behaviour required from a kernel connection.
///
/// Implementations may invoke callbacks on any thread, and may invoke them
/// synchronously from inside the method that registered them. When `fetch`
/// or `subscribe` return an error, the supplied callbacks are dropped
/// without being called.
pub trait KernelConnector: Send + Sync {
    /// Display name of the kernel, used in update titles.
    fn kernel_name(&self) -> String;

    /// Runs `callback` once the kernel connection is usable. Connectors that
    /// are already ready call it immediately.
    fn when_ready(&self, callback: ReadyCallback);

    /// Submits an execute request.
    ///
    /// `on_reply` runs once per reply message associated with the request;
    /// no message marks the end of the stream, so callers infer completion
    /// from message kinds. `on_complete` runs once when the request has
    /// finished executing.
    ///
    /// # Errors
    ///
    /// Returns an error when the request could not be submitted.
    fn fetch(
        &self,
        request: ExecuteRequest,
        on_reply: ReplyCallback,
        on_complete: CompletionCallback,
    ) -> Result<(), ConnectorError>;

    /// Subscribes to every broadcast message on the session.
    ///
    /// # Errors
    ///
    /// Returns an error when the broadcast channel is unavailable.
    fn subscribe(&self, listener: BroadcastListener) -> Result<SubscriptionId, ConnectorError>;

    /// Removes a subscription. Returns `false` when it was not live.
    fn unsubscribe(&self, subscription: SubscriptionId) -> bool;
}

impl fmt::Debug for dyn KernelConnector {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("KernelConnector")
    }
}
