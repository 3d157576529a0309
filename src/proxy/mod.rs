//! Validated datasource proxy.
//!
//! # Data Flow
//! ```text
//! /api/datasources/proxy/{id}/{*path}
//!     → dispatcher.rs (resolve, plugin lookup, validate, normalize)
//!     → validation.rs (path and query allow-list)
//!     → path.rs (trailing slash)
//!     → engine.rs (forward upstream)
//!     → error.rs (rejections rendered as JSON)
//! ```

pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod path;
pub mod validation;

pub use dispatcher::{ProxyDispatcher, ProxyRequest};
pub use engine::{HttpProxyFactory, ProxyBuildError, ProxyFactory, ProxyHandler};
pub use error::ProxyError;
