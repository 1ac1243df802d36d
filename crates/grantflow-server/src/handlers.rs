//! Authorization, device verification and health endpoints.
//!
//! The token, revocation, introspection and device authorization endpoints
//! come straight from [`grantflow::http`]. The handlers here stand in for
//! the login and consent pages a real deployment renders: the end user is
//! named by a `user_id` parameter.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use grantflow::oauth::Grant;
use grantflow::storage::UserStore;
use grantflow::types::User;
use grantflow::{OAuth2Error, OAuth2Request, OAuth2Response, OAuth2Result};
use serde::Serialize;

use crate::server::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Loads the user named by the `user_id` parameter, if any.
async fn end_user(state: &AppState, request: &OAuth2Request) -> OAuth2Result<Option<User>> {
    match request.param("user_id").filter(|id| !id.is_empty()) {
        Some(user_id) => Ok(state.store.find_user(user_id).await?),
        None => Ok(None),
    }
}

/// Consent page.
///
/// Answers 200 with the prompt to show (`login`, `consent`), `ok` when the
/// request may proceed, or the form-urlencoded error.
pub async fn authorize_get(State(state): State<AppState>, request: OAuth2Request) -> Response {
    let result: OAuth2Result<Grant> = async {
        let user = end_user(&state, &request).await?;
        state
            .server
            .validate_consent_request(&request, user.as_ref())
            .await
    }
    .await;

    let body = match result {
        Ok(grant) => grant
            .prompt
            .map_or_else(|| "ok".to_string(), |prompt| prompt.to_string()),
        Err(err) => state.server.error_body(err),
    };
    (StatusCode::OK, body).into_response()
}

/// Consent decision. A missing or unknown `user_id` denies the request.
pub async fn authorize_post(
    State(state): State<AppState>,
    request: OAuth2Request,
) -> OAuth2Response {
    match end_user(&state, &request).await {
        Ok(user) => {
            state
                .server
                .create_authorization_response(&request, user.as_ref())
                .await
        }
        Err(err) => state.server.handle_error(err),
    }
}

/// Device verification page decision.
///
/// Approves `user_code` for `user_id`, or denies it when `user_id` is
/// absent or `action=deny` is sent.
pub async fn device_decision(
    State(state): State<AppState>,
    request: OAuth2Request,
) -> OAuth2Response {
    let result: OAuth2Result<()> = async {
        let user_code = request
            .param("user_code")
            .ok_or_else(|| OAuth2Error::invalid_request("Missing \"user_code\" in request"))?;
        let user = end_user(&state, &request).await?;
        match user {
            Some(user) if request.param("action") != Some("deny") => {
                state.server.approve_device(user_code, &user).await
            }
            _ => state.server.deny_device(user_code).await,
        }
    }
    .await;

    match result {
        Ok(()) => OAuth2Response::ok(),
        Err(err) => state.server.handle_error(err),
    }
}
