//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Proxied request:
//!     → headers.rs (strip hop-by-hop and caller credentials, add X-Forwarded-For)
//!     → upstream
//! Upstream response:
//!     → headers.rs (strip hop-by-hop, drop Set-Cookie)
//! ```
//!
//! # Design Decisions
//! - Fail closed: unknown identity never reaches the dispatcher
//! - No trust in client input

pub mod headers;
