//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::datasource::types::{DataSourceAccess, DataSourcePermission};

/// Root configuration for the datasource proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Caller identity extraction.
    pub auth: AuthConfig,

    /// Dispatcher and engine settings.
    pub proxy: ProxySettings,

    /// Datasource resolution cache.
    pub cache: CacheConfig,

    /// Registered datasource plugin types.
    pub plugins: Vec<PluginConfig>,

    /// Datasources provisioned at startup and on reload.
    pub datasources: Vec<DataSourceConfig>,

    /// New-account provisioning settings.
    pub provisioning: ProvisioningConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            auth: AuthConfig::default(),
            proxy: ProxySettings::default(),
            cache: CacheConfig::default(),
            plugins: default_plugins(),
            datasources: Vec::new(),
            provisioning: ProvisioningConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Headers carrying the authenticated caller, set by the fronting auth proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub user_id_header: String,
    pub login_header: String,
    pub org_id_header: String,
    pub role_header: String,
    /// A value of `true` in this header bypasses the datasource cache.
    pub no_cache_header: String,
}

impl AuthConfig {
    /// Lowercased names of every identity header; never forwarded upstream.
    pub fn identity_headers(&self) -> Vec<String> {
        [
            &self.user_id_header,
            &self.login_header,
            &self.org_id_header,
            &self.role_header,
            &self.no_cache_header,
        ]
        .into_iter()
        .map(|name| name.to_ascii_lowercase())
        .collect()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_id_header: "X-User-Id".to_string(),
            login_header: "X-User-Login".to_string(),
            org_id_header: "X-Org-Id".to_string(),
            role_header: "X-Org-Role".to_string(),
            no_cache_header: "X-Proxy-NoCache".to_string(),
        }
    }
}

/// Dispatcher and proxy engine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Include internal error text in rejection bodies.
    pub expose_error_details: bool,

    /// Maximum request body forwarded upstream, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            expose_error_details: false,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Datasource cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a resolved datasource is reused, in seconds.
    pub datasource_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            datasource_ttl_secs: 5,
        }
    }
}

/// A datasource plugin type.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginConfig {
    /// Type name datasources refer to (e.g., "prometheus").
    pub id: String,

    /// Human readable name.
    #[serde(default)]
    pub name: String,

    /// Whether requests for this type may be proxied.
    #[serde(default = "default_true")]
    pub proxy: bool,

    /// Extra request headers forwarded upstream untouched.
    #[serde(default)]
    pub allowed_headers: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_plugins() -> Vec<PluginConfig> {
    vec![PluginConfig {
        id: "prometheus".to_string(),
        name: "Prometheus".to_string(),
        proxy: true,
        allowed_headers: Vec::new(),
    }]
}

/// A datasource definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataSourceConfig {
    pub id: i64,

    #[serde(default = "default_org_id")]
    pub org_id: i64,

    pub name: String,

    /// Plugin type name.
    #[serde(rename = "type")]
    pub ds_type: String,

    pub url: String,

    #[serde(default)]
    pub access: DataSourceAccess,

    #[serde(default)]
    pub basic_auth_user: Option<String>,

    #[serde(default)]
    pub basic_auth_password: Option<String>,

    #[serde(default)]
    pub is_default: bool,

    #[serde(default)]
    pub read_only: bool,

    /// Empty means every org member may query.
    #[serde(default)]
    pub permissions: Vec<DataSourcePermission>,
}

fn default_org_id() -> i64 {
    1
}

/// New-account provisioning configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Run the sign-up workflow.
    pub enabled: bool,

    /// User added as Admin to every new org.
    pub dummy_org_admin_id: i64,

    /// Org owning the datasource copied into new orgs.
    pub main_datasource_org_id: i64,

    /// Datasource copied into new orgs.
    pub main_datasource_id: i64,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dummy_org_admin_id: 1,
            main_datasource_org_id: 1,
            main_datasource_id: 1,
        }
    }
}
