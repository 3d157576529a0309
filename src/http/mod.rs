//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID)
//!     → middleware/auth.rs (caller identity)
//!     → proxy dispatcher or signup.rs
//!     → response.rs (JSON errors)
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod signup;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{json_api_error, ApiErrorBody};
pub use server::{AppState, HttpServer};
