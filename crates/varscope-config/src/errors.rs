//! Errors raised while validating inspector configuration.

use thiserror::Error;

/// Configuration problems detected before an inspector is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required command string was empty.
    #[error("inspector configuration field '{field}' must not be empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A profile was registered twice for the same language.
    #[error("language '{language}' already has an inspector profile")]
    DuplicateProfile {
        /// Normalised language name.
        language: String,
    },
}
