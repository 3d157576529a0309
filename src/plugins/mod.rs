//! Datasource plugin types.
//!
//! The registry is built once from configuration, frozen, and injected into
//! the dispatcher. Reloads build a new registry instead of mutating one.

pub mod registry;

pub use registry::{DataSourcePlugin, PluginRegistry};
