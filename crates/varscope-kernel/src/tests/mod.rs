//! Crate-level tests driving inspectors through a fake connector.

mod support;
