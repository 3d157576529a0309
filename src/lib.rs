//! Validated datasource proxy.
//!
//! Forwards `/api/datasources/proxy/{id}/**` calls to the datasource they
//! name once the caller, the datasource plugin and the request shape have
//! all been checked.

pub mod accounts;
pub mod config;
pub mod datasource;
pub mod events;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod observability;
pub mod plugins;
pub mod proxy;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
