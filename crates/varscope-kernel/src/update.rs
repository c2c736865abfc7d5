//! Structured inspection updates published to subscribers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header shown above an inspection result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct InspectionTitle {
    /// Display name of the kernel.
    pub kernel_name: String,
    /// Free-form context, e.g. a notice that the language is unsupported.
    pub context_name: String,
}

/// One snapshot of the kernel's variable state.
///
/// The payload is kept as parsed JSON; its schema belongs to the query
/// command. [`InspectionUpdate::variables`] offers a typed view for the
/// common variable-list layout.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InspectionUpdate {
    /// Header information.
    pub title: InspectionTitle,
    /// Parsed payload returned by the query command.
    pub payload: Value,
}

impl InspectionUpdate {
    /// Builds an update.
    #[must_use]
    pub const fn new(title: InspectionTitle, payload: Value) -> Self {
        Self { title, payload }
    }

    /// Decodes the payload as a list of variable descriptors.
    ///
    /// # Errors
    ///
    /// Returns the deserialisation error when the payload uses another
    /// layout.
    pub fn variables(&self) -> Result<Vec<VariableDescriptor>, serde_json::Error> {
        Vec::<VariableDescriptor>::deserialize(&self.payload)
    }
}

/// Conventional description of one kernel variable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableDescriptor {
    /// Variable name.
    pub var_name: String,
    /// Type name as reported by the kernel.
    pub var_type: String,
    /// Memory footprint, formatted by the kernel.
    pub var_size: String,
    /// Shape of array-like values.
    pub var_shape: String,
    /// Abbreviated content preview.
    pub var_content: String,
    /// Whether the variable can be opened as a table.
    pub is_matrix: bool,
    /// Whether the variable is an interactive widget.
    pub is_widget: bool,
}
