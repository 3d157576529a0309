//! Logs and metrics.
//!
//! `logging.rs` installs the tracing subscriber; `metrics.rs` owns every
//! metric name the proxy records and the optional Prometheus listener.

pub mod logging;
pub mod metrics;
