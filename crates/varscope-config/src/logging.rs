use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::defaults::{default_log_filter_string, default_log_format};

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    Json,
    /// Human-readable single line output.
    #[default]
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

/// Logging settings consumed by telemetry initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSettings {
    /// `tracing` filter expression, e.g. `info,varscope_kernel=debug`.
    #[serde(default = "default_log_filter_string")]
    pub filter: String,
    /// Output format.
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl LogSettings {
    /// Builds settings with an explicit filter and format.
    #[must_use]
    pub fn new(filter: impl Into<String>, format: LogFormat) -> Self {
        Self {
            filter: filter.into(),
            format,
        }
    }

    /// Filter expression to hand to the subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.filter.as_str()
    }

    /// Selected output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.format
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter_string(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("JSON", LogFormat::Json)]
    #[case("compact", LogFormat::Compact)]
    fn parses_log_format_case_insensitively(#[case] input: &str, #[case] expected: LogFormat) {
        assert_eq!(LogFormat::from_str(input).ok(), Some(expected));
    }

    #[rstest]
    fn rejects_unknown_log_format() {
        assert!(LogFormat::from_str("pretty").is_err());
    }

    #[rstest]
    fn missing_fields_fall_back_to_defaults() {
        let settings: LogSettings =
            serde_json::from_str("{}").expect("empty settings should deserialise");
        assert_eq!(settings, LogSettings::default());
        assert_eq!(settings.log_filter(), "info");
        assert_eq!(settings.log_format(), LogFormat::Compact);
    }
}
