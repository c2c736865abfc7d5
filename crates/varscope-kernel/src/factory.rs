//! Selects an inspector implementation for a kernel language.

use std::sync::Arc;

use tracing::info;
use varscope_config::ProfileRegistry;

use crate::connector::KernelConnector;
use crate::errors::InspectorError;
use crate::handler::{INSPECTOR_TARGET, KernelInspector};
use crate::inspector::VariableInspector;
use crate::unsupported::UnsupportedInspector;

/// Builds the inspector for a kernel speaking `language`.
///
/// Languages with a profile in `profiles` get a [`KernelInspector`]; all
/// others get an [`UnsupportedInspector`].
///
/// # Errors
///
/// Propagates configuration errors from [`KernelInspector::new`].
pub fn inspector_for(
    connector: Arc<dyn KernelConnector>,
    language: &str,
    profiles: &ProfileRegistry,
) -> Result<Box<dyn VariableInspector>, InspectorError> {
    match profiles.profile(language) {
        Some(config) => {
            let inspector = KernelInspector::new(connector, config.clone())?;
            Ok(Box::new(inspector))
        }
        None => {
            info!(
                target: INSPECTOR_TARGET,
                language,
                "no inspector profile for language, using fallback inspector"
            );
            Ok(Box::new(UnsupportedInspector::new(connector.kernel_name())))
        }
    }
}
