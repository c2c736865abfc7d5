//! Registry of inspector profiles keyed by kernel language.

use std::collections::HashMap;

use crate::errors::ConfigError;
use crate::inspector::InspectorConfig;

/// Maps kernel language names to their inspector configuration.
///
/// Language names are matched case-insensitively after trimming, so
/// `"Python"` and `" python "` resolve to the same profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, InspectorConfig>,
}

impl ProfileRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a validated profile for `language`.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or the language already has
    /// a profile.
    pub fn register(
        &mut self,
        language: &str,
        config: InspectorConfig,
    ) -> Result<(), ConfigError> {
        config.validate()?;
        let key = normalise(language);
        if self.profiles.contains_key(&key) {
            return Err(ConfigError::DuplicateProfile { language: key });
        }
        self.profiles.insert(key, config);
        Ok(())
    }

    /// Returns the profile for `language`, if any.
    #[must_use]
    pub fn profile(&self, language: &str) -> Option<&InspectorConfig> {
        self.profiles.get(&normalise(language))
    }

    /// Number of registered profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no profiles are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn normalise(language: &str) -> String {
    language.trim().to_ascii_lowercase()
}
