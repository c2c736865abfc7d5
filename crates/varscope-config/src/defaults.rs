//! Default values shared by hosts embedding the inspector.

use crate::logging::LogFormat;

/// Default log filter expression used when the host does not supply one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Context label attached to updates produced for kernels without a profile.
pub const UNSUPPORTED_LANGUAGE_CONTEXT: &str = "language currently not supported";

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
