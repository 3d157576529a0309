//! Configuration: TOML schema, loading, semantic validation and hot reload.
//!
//! ```text
//! datasource-proxy.toml
//!     → loader.rs     toml → ProxyConfig
//!     → validation.rs every semantic error at once
//!     → HttpServer    provisions datasources, builds the dispatcher snapshot
//!
//! watcher.rs (--watch): changed, valid file → mpsc → server swaps snapshot
//! ```
//!
//! Every section has defaults, so an empty file is a working config.

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::AuthConfig;
pub use schema::CacheConfig;
pub use schema::DataSourceConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::PluginConfig;
pub use schema::ProvisioningConfig;
pub use schema::ProxyConfig;
pub use schema::ProxySettings;
pub use schema::TimeoutConfig;
