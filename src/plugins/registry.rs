//! Plugin type registry.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) lookup by type name via HashMap

use std::collections::HashMap;

use crate::config::PluginConfig;

/// Metadata needed to build a proxy for one datasource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourcePlugin {
    /// Type name datasources refer to.
    pub id: String,
    pub name: String,
    /// Whether this type may be proxied at all.
    pub proxy: bool,
    /// Lowercased request headers forwarded upstream untouched.
    pub allowed_headers: Vec<String>,
}

impl From<&PluginConfig> for DataSourcePlugin {
    fn from(c: &PluginConfig) -> Self {
        let name = if c.name.is_empty() { c.id.clone() } else { c.name.clone() };
        Self {
            id: c.id.clone(),
            name,
            proxy: c.proxy,
            allowed_headers: c.allowed_headers.iter().map(|h| h.to_ascii_lowercase()).collect(),
        }
    }
}

/// Read-only map from datasource type name to plugin.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, DataSourcePlugin>,
}

impl PluginRegistry {
    /// Build a registry. Later duplicates replace earlier ones.
    pub fn new(plugins: impl IntoIterator<Item = DataSourcePlugin>) -> Self {
        Self {
            plugins: plugins.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn from_configs(configs: &[PluginConfig]) -> Self {
        Self::new(configs.iter().map(DataSourcePlugin::from))
    }

    /// Look up a plugin that may be proxied.
    pub fn get(&self, ds_type: &str) -> Option<&DataSourcePlugin> {
        self.plugins.get(ds_type).filter(|p| p.proxy)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
