//! OAuth 2.0 error types.
//!
//! Every validation failure in the engine is expressed as an [`OAuth2Error`]
//! carrying exactly one [`ErrorCode`] from the closed RFC 6749 / RFC 8628 /
//! RFC 7009 vocabulary. Failures from storage backends are reported as
//! [`StorageError`] and surface to clients only as `server_error`.

use std::fmt;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::types::ResponseMode;

// =============================================================================
// Error Codes
// =============================================================================

/// OAuth 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is missing a required parameter or is otherwise malformed.
    InvalidRequest,
    /// Client authentication failed.
    InvalidClient,
    /// The grant or refresh token is invalid, expired, revoked or mismatched.
    InvalidGrant,
    /// The client is not authorized to use this grant or response type.
    UnauthorizedClient,
    /// The grant type is not supported by the server.
    UnsupportedGrantType,
    /// The response type is not supported by the server.
    UnsupportedResponseType,
    /// The requested scope is invalid, unknown or exceeds the granted scope.
    InvalidScope,
    /// The resource owner or server denied the request.
    AccessDenied,
    /// Unexpected condition on the server.
    ServerError,
    /// The server is temporarily unable to handle the request.
    TemporarilyUnavailable,
    /// Device flow: the user has not yet completed the authorization.
    AuthorizationPending,
    /// Device flow: the client is polling too quickly.
    SlowDown,
    /// Device flow: the device code has expired.
    ExpiredToken,
    /// Revocation: the token type hint is not supported.
    UnsupportedTokenType,
}

impl ErrorCode {
    /// Returns the wire representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidScope => "invalid_scope",
            Self::AccessDenied => "access_denied",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::AuthorizationPending => "authorization_pending",
            Self::SlowDown => "slow_down",
            Self::ExpiredToken => "expired_token",
            Self::UnsupportedTokenType => "unsupported_token_type",
        }
    }

    /// Parses a wire error code.
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        let parsed = match code {
            "invalid_request" => Self::InvalidRequest,
            "invalid_client" => Self::InvalidClient,
            "invalid_grant" => Self::InvalidGrant,
            "unauthorized_client" => Self::UnauthorizedClient,
            "unsupported_grant_type" => Self::UnsupportedGrantType,
            "unsupported_response_type" => Self::UnsupportedResponseType,
            "invalid_scope" => Self::InvalidScope,
            "access_denied" => Self::AccessDenied,
            "server_error" => Self::ServerError,
            "temporarily_unavailable" => Self::TemporarilyUnavailable,
            "authorization_pending" => Self::AuthorizationPending,
            "slow_down" => Self::SlowDown,
            "expired_token" => Self::ExpiredToken,
            "unsupported_token_type" => Self::UnsupportedTokenType,
            _ => return None,
        };
        Some(parsed)
    }

    /// Returns the HTTP status used when the error is rendered as a body.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidClient => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::TemporarilyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// OAuth2Error
// =============================================================================

/// Where an error should be delivered when it is rendered as a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRedirect {
    /// The client's resolved redirect URI.
    pub uri: String,
    /// Whether parameters go into the query or the fragment.
    pub mode: ResponseMode,
}

/// A protocol-level OAuth 2.0 error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {}", .description.as_deref().unwrap_or("no description"))]
pub struct OAuth2Error {
    /// The error code.
    pub code: ErrorCode,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Optional URI of a page describing the error.
    pub uri: Option<String>,
    /// The `state` supplied by the client, echoed back verbatim.
    pub state: Option<String>,
    /// Redirect target, set once the client's redirect URI is trusted.
    pub redirect: Option<ErrorRedirect>,
}

impl OAuth2Error {
    /// Creates an error with no description.
    #[must_use]
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            description: None,
            uri: None,
            state: None,
            redirect: None,
        }
    }

    fn described(code: ErrorCode, description: impl Into<String>) -> Self {
        Self::new(code).with_description(description)
    }

    // -------------------------------------------------------------------------
    // Constructor Methods
    // -------------------------------------------------------------------------

    /// Create an `invalid_request` error.
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::described(ErrorCode::InvalidRequest, description)
    }

    /// Create an `invalid_client` error.
    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::described(ErrorCode::InvalidClient, description)
    }

    /// Create an `invalid_grant` error.
    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::described(ErrorCode::InvalidGrant, description)
    }

    /// Create an `unauthorized_client` error.
    #[must_use]
    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self::described(ErrorCode::UnauthorizedClient, description)
    }

    /// Create an `unsupported_grant_type` error.
    #[must_use]
    pub fn unsupported_grant_type(description: impl Into<String>) -> Self {
        Self::described(ErrorCode::UnsupportedGrantType, description)
    }

    /// Create an `unsupported_response_type` error.
    #[must_use]
    pub fn unsupported_response_type(description: impl Into<String>) -> Self {
        Self::described(ErrorCode::UnsupportedResponseType, description)
    }

    /// Create an `invalid_scope` error.
    #[must_use]
    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::described(ErrorCode::InvalidScope, description)
    }

    /// Create an `access_denied` error.
    #[must_use]
    pub fn access_denied(description: impl Into<String>) -> Self {
        Self::described(ErrorCode::AccessDenied, description)
    }

    /// Create a `server_error` error.
    #[must_use]
    pub fn server_error(description: impl Into<String>) -> Self {
        Self::described(ErrorCode::ServerError, description)
    }

    /// Create an `authorization_pending` error.
    #[must_use]
    pub fn authorization_pending() -> Self {
        Self::described(
            ErrorCode::AuthorizationPending,
            "The authorization request is still pending",
        )
    }

    /// Create a `slow_down` error.
    #[must_use]
    pub fn slow_down() -> Self {
        Self::described(ErrorCode::SlowDown, "Polling interval must be increased")
    }

    /// Create an `expired_token` error.
    #[must_use]
    pub fn expired_token() -> Self {
        Self::described(ErrorCode::ExpiredToken, "The device code has expired")
    }

    /// Create an `unsupported_token_type` error.
    #[must_use]
    pub fn unsupported_token_type(description: impl Into<String>) -> Self {
        Self::described(ErrorCode::UnsupportedTokenType, description)
    }

    // -------------------------------------------------------------------------
    // Builder Methods
    // -------------------------------------------------------------------------

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the error URI.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Echoes the client-supplied state, if any.
    #[must_use]
    pub fn with_state(mut self, state: Option<&str>) -> Self {
        self.state = state.map(str::to_owned);
        self
    }

    /// Marks the error for delivery via redirect to the client.
    #[must_use]
    pub fn with_redirect(mut self, uri: impl Into<String>, mode: ResponseMode) -> Self {
        self.redirect = Some(ErrorRedirect {
            uri: uri.into(),
            mode,
        });
        self
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    /// Returns the error body as ordered key-value pairs.
    #[must_use]
    pub fn get_body(&self) -> Vec<(&'static str, String)> {
        let mut body = vec![("error", self.code.as_str().to_string())];
        if let Some(description) = &self.description {
            body.push(("error_description", description.clone()));
        }
        if let Some(uri) = &self.uri {
            body.push(("error_uri", uri.clone()));
        }
        if let Some(state) = &self.state {
            body.push(("state", state.clone()));
        }
        body
    }

    /// Returns the error body as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .get_body()
            .into_iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Returns the error body form-urlencoded.
    #[must_use]
    pub fn to_urlencoded(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.get_body())
            .finish()
    }

    /// Returns the headers sent with an inline error body.
    #[must_use]
    pub fn get_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Content-Type", "application/json".to_string()),
            ("Cache-Control", "no-store".to_string()),
            ("Pragma", "no-cache".to_string()),
        ];
        if self.status_code() == StatusCode::UNAUTHORIZED {
            let mut challenge = format!("Basic error=\"{}\"", self.code);
            if let Some(description) = &self.description {
                let quoted = description.replace('\\', "\\\\").replace('"', "\\\"");
                challenge.push_str(&format!(", error_description=\"{quoted}\""));
            }
            headers.push(("WWW-Authenticate", challenge));
        }
        headers
    }

    /// Returns the HTTP status for an inline error body.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Returns `true` if the error is caused by the client's request.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self.code,
            ErrorCode::ServerError | ErrorCode::TemporarilyUnavailable
        )
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend failed to complete the operation.
    #[error("Storage backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// A record with the same key already exists.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflicting record.
        message: String,
    },

    /// The backend is temporarily unavailable.
    #[error("Storage unavailable: {message}")]
    Unavailable {
        /// Description of the outage.
        message: String,
    },
}

impl StorageError {
    /// Create a `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create an `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

impl From<StorageError> for OAuth2Error {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "storage operation failed");
        match err {
            StorageError::Unavailable { .. } => Self::described(
                ErrorCode::TemporarilyUnavailable,
                "The server is temporarily unavailable",
            ),
            _ => Self::server_error("The server encountered an unexpected condition"),
        }
    }
}

/// Result type for protocol operations.
pub type OAuth2Result<T> = Result<T, OAuth2Error>;

// =============================================================================
// Tests
// =============================================================================
