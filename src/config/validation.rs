//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (datasources reference registered plugins)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect conflicting datasource definitions
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("plugin id must not be empty")]
    EmptyPluginId,

    #[error("plugin {0:?} registered twice")]
    DuplicatePlugin(String),

    #[error("datasource id {0} must be positive")]
    InvalidDataSourceId(i64),

    #[error("datasource id {0} defined twice")]
    DuplicateDataSourceId(i64),

    #[error("datasource name {name:?} defined twice in org {org_id}")]
    DuplicateDataSourceName { org_id: i64, name: String },

    #[error("datasource {id} uses unregistered plugin type {ds_type:?}")]
    UnknownPluginType { id: i64, ds_type: String },
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.request_secs"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.connect_secs"));
    }

    let mut plugin_ids = HashSet::new();
    for plugin in &config.plugins {
        if plugin.id.is_empty() {
            errors.push(ValidationError::EmptyPluginId);
        } else if !plugin_ids.insert(plugin.id.as_str()) {
            errors.push(ValidationError::DuplicatePlugin(plugin.id.clone()));
        }
    }

    let mut ds_ids = HashSet::new();
    let mut ds_names = HashSet::new();
    for ds in &config.datasources {
        if ds.id <= 0 {
            errors.push(ValidationError::InvalidDataSourceId(ds.id));
        } else if !ds_ids.insert(ds.id) {
            errors.push(ValidationError::DuplicateDataSourceId(ds.id));
        }

        if !ds_names.insert((ds.org_id, ds.name.as_str())) {
            errors.push(ValidationError::DuplicateDataSourceName {
                org_id: ds.org_id,
                name: ds.name.clone(),
            });
        }

        if !plugin_ids.contains(ds.ds_type.as_str()) {
            errors.push(ValidationError::UnknownPluginType {
                id: ds.id,
                ds_type: ds.ds_type.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
