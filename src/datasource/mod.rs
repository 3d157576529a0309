//! Datasource resolution subsystem.
//!
//! # Data Flow
//! ```text
//! (datasource id, SignedInUser, skip_cache)
//!     → cache.rs (TTL cache, access checks)
//!     → store.rs (authoritative datasource records)
//!     → Arc<DataSource> or DataSourceError
//! ```
//!
//! # Design Decisions
//! - Resolution is behind the `DataSourceResolver` trait so the dispatcher
//!   can be driven by any lookup strategy
//! - Cached entries are shared `Arc`s and never mutated in place
//! - Access checks run on every lookup, cached or not

pub mod cache;
pub mod store;
pub mod types;

pub use cache::{DataSourceCache, DataSourceResolver};
pub use store::{DataSourceStore, InMemoryDataSourceStore};
pub use types::{AddDataSourceCommand, DataSource, DataSourceAccess, DataSourceError, DataSourcePermission};
