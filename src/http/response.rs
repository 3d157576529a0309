//! Response helpers.
//!
//! # Responsibilities
//! - Render rejections as JSON API errors
//! - Keep internal error text out of bodies unless explicitly enabled

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// JSON body of every rejection produced by this server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build a JSON error response.
pub fn json_api_error(status: StatusCode, message: impl Into<String>, error: Option<String>) -> Response {
    let body = ApiErrorBody {
        status: status.as_u16(),
        message: message.into(),
        error,
    };
    (status, Json(body)).into_response()
}
