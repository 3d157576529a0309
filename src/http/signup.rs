//! Sign-up endpoint.
//!
//! Creates the user (and its personal org) and publishes `SignUpCompleted`
//! so the provisioning workflow can run in the background.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::accounts::{AccountError, CreateUserCommand};
use crate::events::SignUpCompleted;
use crate::http::response::json_api_error;
use crate::http::server::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpForm {
    pub email: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn signup_handler(State(state): State<AppState>, Json(form): Json<SignUpForm>) -> Response {
    let email = form.email.trim().to_string();
    if !email.contains('@') {
        return json_api_error(StatusCode::BAD_REQUEST, "Invalid email address", None);
    }

    let login = form.login.filter(|l| !l.trim().is_empty()).unwrap_or_else(|| email.clone());
    let name = form.name.unwrap_or_default();

    let cmd = CreateUserCommand {
        email: email.clone(),
        login,
        name: name.clone(),
    };

    match state.accounts.create_user(cmd).await {
        Ok(user) => {
            let listeners = state.signups.publish(SignUpCompleted { email, name });
            tracing::info!(user_id = user.id, org_id = user.org_id, listeners, "User signed up");
            (
                StatusCode::OK,
                Json(json!({
                    "message": "User sign up completed successfully",
                    "id": user.id,
                })),
            )
                .into_response()
        }
        Err(AccountError::UserExists(_)) => json_api_error(
            StatusCode::CONFLICT,
            "User with same email address already exists",
            None,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Sign up failed");
            json_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user", None)
        }
    }
}
