//! Dispatcher failure taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::datasource::DataSourceError;
use crate::http::response::json_api_error;
use crate::proxy::engine::ProxyBuildError;

/// Why a proxied call was rejected before reaching the datasource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("{0}")]
    AccessDenied(DataSourceError),

    #[error("{0}")]
    ResolutionFailure(DataSourceError),

    #[error("no plugin registered for datasource type {0:?}")]
    PluginNotFound(String),

    #[error("request is outside the allowed proxy paths and queries")]
    ValidationFailure,

    #[error("invalid datasource url {url:?}: {reason}")]
    BackendUrlInvalid { url: String, reason: String },

    #[error("{0}")]
    ProxyConstructionFailure(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ProxyError::ResolutionFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::PluginNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::ValidationFailure => StatusCode::NOT_FOUND,
            ProxyError::BackendUrlInvalid { .. } => StatusCode::BAD_REQUEST,
            ProxyError::ProxyConstructionFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-visible message.
    pub fn message(&self) -> String {
        match self {
            ProxyError::AccessDenied(_) => "Access denied to datasource".to_string(),
            ProxyError::ResolutionFailure(_) => "Unable to load datasource meta data".to_string(),
            ProxyError::PluginNotFound(_) => "Unable to find datasource plugin".to_string(),
            // Never says which check failed.
            ProxyError::ValidationFailure => "Oooops".to_string(),
            ProxyError::BackendUrlInvalid { url, .. } => format!("Invalid data source URL: {url:?}"),
            ProxyError::ProxyConstructionFailure(_) => "Failed creating data source proxy".to_string(),
        }
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            ProxyError::AccessDenied(_) => "access_denied",
            ProxyError::ResolutionFailure(_) => "resolution_failure",
            ProxyError::PluginNotFound(_) => "plugin_not_found",
            ProxyError::ValidationFailure => "validation_failure",
            ProxyError::BackendUrlInvalid { .. } => "invalid_url",
            ProxyError::ProxyConstructionFailure(_) => "construction_failure",
        }
    }

    /// Render the rejection, optionally carrying the internal error text.
    pub fn to_response(&self, expose_details: bool) -> Response {
        // Validation failures never explain themselves.
        let detail = match self {
            ProxyError::ValidationFailure => None,
            _ if expose_details => Some(self.to_string()),
            _ => None,
        };
        json_api_error(self.status(), self.message(), detail)
    }
}

impl From<DataSourceError> for ProxyError {
    fn from(e: DataSourceError) -> Self {
        match e {
            DataSourceError::AccessDenied => ProxyError::AccessDenied(e),
            other => ProxyError::ResolutionFailure(other),
        }
    }
}

impl From<ProxyBuildError> for ProxyError {
    fn from(e: ProxyBuildError) -> Self {
        match e {
            ProxyBuildError::UrlValidation { url, reason } => ProxyError::BackendUrlInvalid { url, reason },
            ProxyBuildError::PathNotAllowed(_) => ProxyError::ValidationFailure,
            other => ProxyError::ProxyConstructionFailure(other.to_string()),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        self.to_response(false)
    }
}
