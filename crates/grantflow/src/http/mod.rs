//! Axum adapters for the authorization server.
//!
//! [`OAuth2Request`] is an extractor and [`OAuth2Response`] implements
//! [`IntoResponse`], so endpoint handlers are thin wrappers around
//! [`AuthorizationServer`] operations. The authorization endpoint is left
//! to the hosting application since it needs an end user.
//!
//! # Available Handlers
//!
//! - [`token_handler`] - Token endpoint (RFC 6749 Section 3.2)
//! - [`revoke_handler`] - Token revocation endpoint (RFC 7009)
//! - [`introspect_handler`] - Token introspection endpoint (RFC 7662)
//! - [`device_authorization_handler`] - Device authorization endpoint (RFC 8628)

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::oauth::request::OAuth2Request;
use crate::oauth::response::{OAuth2Response, ResponseBody};
use crate::oauth::server::AuthorizationServer;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Whether the request reached the proxy or the server over TLS.
fn is_secure(request: &Request) -> bool {
    if request.uri().scheme_str() == Some("https") {
        return true;
    }
    request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

/// Form bodies are read when declared, or when no content type is sent.
fn is_form(headers: &HeaderMap) -> bool {
    match headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        Some(content_type) => content_type
            .split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE)),
        None => true,
    }
}

impl<S> FromRequest<S> for OAuth2Request
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let secure = is_secure(&req);
        let method = req.method().clone();
        let uri = req.uri().to_string();
        let headers = req.headers().clone();

        let body = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let mut request = OAuth2Request::new(method, uri).with_secure(secure);
        if !body.is_empty() && is_form(&headers) {
            request = request.with_form_body(&body);
        }
        if let Some(authorization) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            request = request.with_authorization(authorization);
        }
        Ok(request)
    }
}

impl IntoResponse for OAuth2Response {
    fn into_response(self) -> Response {
        let body = match self.body {
            ResponseBody::Empty => Body::empty(),
            ResponseBody::Json(value) => Body::from(value.to_string()),
            ResponseBody::Text(text) => Body::from(text),
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        for (name, value) in self.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().append(name, value);
                }
                _ => {
                    tracing::error!(header = %name, "Dropping invalid response header");
                    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                }
            }
        }
        response
    }
}

/// Token endpoint.
///
/// # Request
///
/// - Method: POST (GET is answered with `unsupported_grant_type`)
/// - Content-Type: application/x-www-form-urlencoded
pub async fn token_handler(
    State(server): State<Arc<AuthorizationServer>>,
    request: OAuth2Request,
) -> OAuth2Response {
    server.create_token_response(&request).await
}

/// Token revocation endpoint.
///
/// # Response
///
/// - 200 OK: Token revoked, or unknown
/// - 400 Bad Request: Missing token or unsupported `token_type_hint`
/// - 401 Unauthorized: Invalid client credentials
pub async fn revoke_handler(
    State(server): State<Arc<AuthorizationServer>>,
    request: OAuth2Request,
) -> OAuth2Response {
    server.create_revocation_response(&request).await
}

/// Token introspection endpoint.
pub async fn introspect_handler(
    State(server): State<Arc<AuthorizationServer>>,
    request: OAuth2Request,
) -> OAuth2Response {
    server.create_introspection_response(&request).await
}

/// Device authorization endpoint.
pub async fn device_authorization_handler(
    State(server): State<Arc<AuthorizationServer>>,
    request: OAuth2Request,
) -> OAuth2Response {
    server.create_device_authorization_response(&request).await
}
