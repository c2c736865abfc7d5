//! Shared fixtures and helpers for inspector tests.

mod fake_connector;
mod world;

use std::sync::Arc;

use rstest::fixture;
use varscope_config::InspectorConfig;

use crate::KernelInspector;

pub use fake_connector::FakeConnector;
pub use world::TestWorld;

/// Query command used by the test profile.
pub const QUERY: &str = "_varscope_dict_list()";
/// Matrix command prefix used by the test profile.
pub const MATRIX: &str = "_varscope_getmatrixcontent";
/// Initialisation script used by the test profile.
pub const INIT: &str = "import json\ndef _varscope_dict_list(): ...";
/// Delete command prefix used by the test profile.
pub const DELETE: &str = "_varscope_deletevariable";

/// Profile resembling a Python kernel setup.
#[fixture]
pub fn python_config() -> InspectorConfig {
    InspectorConfig::new(QUERY, MATRIX, INIT).with_delete_command(DELETE)
}

/// Wraps `json` the way a Python kernel renders a string result.
#[must_use]
pub fn quoted(json: &str) -> String {
    format!("'{json}'")
}

/// Builds an inspector over a fresh connector without signalling readiness.
#[must_use]
pub fn pending_inspector(config: InspectorConfig) -> (FakeConnector, KernelInspector) {
    let connector = FakeConnector::new("Python 3");
    let inspector = KernelInspector::new(Arc::new(connector.clone()), config)
        .unwrap_or_else(|error| panic!("inspector construction failed: {error}"));
    (connector, inspector)
}

/// Builds an inspector that has finished initialising and subscribed.
#[must_use]
pub fn subscribed_inspector(config: InspectorConfig) -> (FakeConnector, KernelInspector) {
    let (connector, inspector) = pending_inspector(config);
    connector.make_ready();
    connector.complete_code(INIT, Ok(()));
    (connector, inspector)
}
