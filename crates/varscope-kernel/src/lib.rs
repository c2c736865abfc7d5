//! Kernel variable inspection.
//!
//! The crate keeps a display surface informed about the variables living in
//! a running kernel. A [`KernelInspector`] installs helper code once the
//! kernel is ready, submits inspection queries on request, decodes the
//! quoted JSON the kernel prints back, and re-inspects automatically
//! whenever someone else executes code on the same kernel. Transport details
//! stay behind the [`KernelConnector`] trait so hosts and tests can plug in
//! their own session plumbing.
//!
//! Kernels without a configured language profile get an
//! [`UnsupportedInspector`]; [`inspector_for`] picks between the two.

mod connector;
mod errors;
mod factory;
mod handler;
mod inspector;
mod matrix;
mod message;
mod payload;
mod signal;
pub mod telemetry;
mod unsupported;
mod update;

#[cfg(test)]
mod tests;

pub use connector::{
    BroadcastListener, CompletionCallback, ConnectorError, KernelConnector, ReadyCallback,
    ReplyCallback, SubscriptionId,
};
pub use errors::{InspectionFailure, InspectorError, InspectorOperation};
pub use factory::inspector_for;
pub use handler::{InspectorState, KernelInspector};
pub use inspector::VariableInspector;
pub use matrix::{CellRegion, MatrixModel, MatrixRequest, TableField, TableOptions, TableSchema};
pub use message::{ExecuteRequest, KernelMessage, MessageKind, RequestId};
pub use payload::{KernelError, KernelReply, PayloadError, decode_text_payload, unquote};
pub use unsupported::UnsupportedInspector;
pub use update::{InspectionTitle, InspectionUpdate, VariableDescriptor};
