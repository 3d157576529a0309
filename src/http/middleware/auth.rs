//! Caller identity middleware.
//! Turns the headers set by the fronting auth proxy into a `SignedInUser`.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::http::response::json_api_error;
use crate::http::server::AppState;
use crate::identity::{OrgRole, SignedInUser};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("missing {0} header")]
    Missing(String),

    #[error("invalid {header} header: {value:?}")]
    Invalid { header: String, value: String },
}

impl IdentityError {
    pub fn status(&self) -> StatusCode {
        match self {
            IdentityError::Missing(_) => StatusCode::UNAUTHORIZED,
            IdentityError::Invalid { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let message = match self.status() {
            StatusCode::UNAUTHORIZED => "Unauthorized",
            _ => "Bad request",
        };
        json_api_error(self.status(), message, Some(self.to_string()))
    }
}

pub async fn identity_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let identity = extract_identity(req.headers(), &state.inner.load().config.auth);
    match identity {
        Ok(user) => {
            tracing::debug!(user_id = user.user_id, org_id = user.org_id, role = %user.org_role, "Caller identified");
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting unidentified request");
            e.into_response()
        }
    }
}

/// Read the caller from request headers.
///
/// User and org ids are required. A missing role means Viewer.
pub fn extract_identity(headers: &HeaderMap, auth: &AuthConfig) -> Result<SignedInUser, IdentityError> {
    let user_id = required_id(headers, &auth.user_id_header)?;
    let org_id = required_id(headers, &auth.org_id_header)?;

    let org_role = match header_str(headers, &auth.role_header) {
        Some(raw) => raw.parse::<OrgRole>().map_err(|_| IdentityError::Invalid {
            header: auth.role_header.clone(),
            value: raw.to_string(),
        })?,
        None => OrgRole::Viewer,
    };

    let login = header_str(headers, &auth.login_header).unwrap_or_default().to_string();
    let skip_cache = header_str(headers, &auth.no_cache_header)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    Ok(SignedInUser {
        user_id,
        login,
        org_id,
        org_role,
        skip_cache,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn required_id(headers: &HeaderMap, name: &str) -> Result<i64, IdentityError> {
    let raw = header_str(headers, name).ok_or_else(|| IdentityError::Missing(name.to_string()))?;
    raw.parse::<i64>().map_err(|_| IdentityError::Invalid {
        header: name.to_string(),
        value: raw.to_string(),
    })
}
