//! Per-kernel command configuration for the inspector.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::errors::ConfigError;

/// How the inspector recognises execution traffic that it issued itself.
///
/// Own traffic never triggers an automatic re-inspection.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OwnTrafficPolicy {
    /// Own when the executed code equals the query or matrix query command
    /// verbatim, or when the message answers one of our request ids.
    #[default]
    CodeOrRequestTag,
    /// Own when the message answers one of our request ids. Parented user
    /// code that matches a query command verbatim still re-triggers;
    /// messages without a parent id fall back to the verbatim match.
    RequestTagOnly,
}

/// Command strings and policies for one inspector instance.
///
/// The scripts are opaque to the inspector; they are submitted to the kernel
/// exactly as configured.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InspectorConfig {
    query_command: String,
    matrix_query_command: String,
    init_script: String,
    #[serde(default)]
    delete_command: Option<String>,
    #[serde(default)]
    own_traffic: OwnTrafficPolicy,
}

impl InspectorConfig {
    /// Builds a configuration from the three required scripts.
    #[must_use]
    pub fn new(
        query_command: impl Into<String>,
        matrix_query_command: impl Into<String>,
        init_script: impl Into<String>,
    ) -> Self {
        Self {
            query_command: query_command.into(),
            matrix_query_command: matrix_query_command.into(),
            init_script: init_script.into(),
            delete_command: None,
            own_traffic: OwnTrafficPolicy::default(),
        }
    }

    /// Sets the command used to delete a variable from the kernel namespace.
    #[must_use]
    pub fn with_delete_command(mut self, delete_command: impl Into<String>) -> Self {
        self.delete_command = Some(delete_command.into());
        self
    }

    /// Overrides the own-traffic policy.
    #[must_use]
    pub fn with_own_traffic(mut self, own_traffic: OwnTrafficPolicy) -> Self {
        self.own_traffic = own_traffic;
        self
    }

    /// Command that returns the serialised variable list.
    #[must_use]
    pub fn query_command(&self) -> &str {
        self.query_command.as_str()
    }

    /// Command prefix that returns a table description for one variable.
    #[must_use]
    pub fn matrix_query_command(&self) -> &str {
        self.matrix_query_command.as_str()
    }

    /// Script run once on the kernel before any automatic inspection.
    #[must_use]
    pub fn init_script(&self) -> &str {
        self.init_script.as_str()
    }

    /// Command prefix used to delete a variable, when configured.
    #[must_use]
    pub fn delete_command(&self) -> Option<&str> {
        self.delete_command.as_deref()
    }

    /// Policy used to recognise the inspector's own traffic.
    #[must_use]
    pub const fn own_traffic(&self) -> OwnTrafficPolicy {
        self.own_traffic
    }

    /// Rejects configurations with empty required commands.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyField`] naming the first empty field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("query_command", &self.query_command),
            ("matrix_query_command", &self.matrix_query_command),
            ("init_script", &self.init_script),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField { field });
            }
        }
        if let Some(delete) = &self.delete_command
            && delete.trim().is_empty()
        {
            return Err(ConfigError::EmptyField {
                field: "delete_command",
            });
        }
        Ok(())
    }
}
