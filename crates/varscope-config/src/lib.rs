//! Shared configuration for the variable-inspection core.
//!
//! Hosts build an [`InspectorConfig`] per kernel language (usually via a
//! [`ProfileRegistry`]) and hand it to the inspector at construction time.
//! The command strings are opaque: this crate never interprets them beyond
//! checking they are present.

mod defaults;
mod errors;
mod inspector;
mod logging;
mod profiles;

pub use defaults::{
    DEFAULT_LOG_FILTER, UNSUPPORTED_LANGUAGE_CONTEXT, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use errors::ConfigError;
pub use inspector::{InspectorConfig, OwnTrafficPolicy};
pub use logging::{LogFormat, LogFormatParseError, LogSettings};
pub use profiles::ProfileRegistry;
