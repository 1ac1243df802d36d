//! Issued token records.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Token type hint for revocation and introspection requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    /// The token is an access token.
    AccessToken,
    /// The token is a refresh token.
    RefreshToken,
}

impl TokenTypeHint {
    /// Returns the token type hint as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// Parses a wire token type hint.
    #[must_use]
    pub fn parse(hint: &str) -> Option<Self> {
        match hint {
            "access_token" => Some(Self::AccessToken),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

/// A persisted bearer token.
///
/// Created by a grant on success and saved through the
/// [`TokenStore`](crate::storage::TokenStore). Access tokens are valid until
/// `issued_at + expires_in` or revocation; refresh tokens until their own
/// expiry or revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Opaque access token value.
    pub access_token: String,

    /// Token type, always `Bearer`.
    pub token_type: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Resource owner, `None` for client-credentials tokens.
    pub user_id: Option<String>,

    /// Granted scope, space-delimited.
    pub scope: String,

    /// Issue time.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// Access token lifetime in seconds.
    pub expires_in: i64,

    /// Optional refresh token value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Refresh token expiry.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub refresh_token_expires_at: Option<OffsetDateTime>,

    /// Set when the token has been revoked.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub revoked_at: Option<OffsetDateTime>,
}

impl Token {
    /// Returns when the access token expires.
    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        self.issued_at + Duration::seconds(self.expires_in)
    }

    /// Returns `true` if the access token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at()
    }

    /// Returns `true` if the token has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Returns `true` if the access token can still be used.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }

    /// Returns `true` if the refresh token can still be exchanged.
    #[must_use]
    pub fn is_refresh_active(&self) -> bool {
        if self.refresh_token.is_none() || self.is_revoked() {
            return false;
        }
        self.refresh_token_expires_at
            .is_none_or(|expires_at| OffsetDateTime::now_utc() < expires_at)
    }

    /// Returns `true` if the token belongs to the given client.
    #[must_use]
    pub fn check_client(&self, client_id: &str) -> bool {
        self.client_id == client_id
    }

    /// Builds the wire representation returned to the client.
    #[must_use]
    pub fn to_response(&self) -> TokenResponse {
        TokenResponse {
            access_token: self.access_token.clone(),
            token_type: self.token_type.clone(),
            expires_in: self.expires_in,
            refresh_token: self.refresh_token.clone(),
            scope: (!self.scope.is_empty()).then(|| self.scope.clone()),
        }
    }
}

/// Successful token response per RFC 6749 Section 5.1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// The token type (always "Bearer").
    pub token_type: String,

    /// Lifetime in seconds.
    pub expires_in: i64,

    /// Refresh token, if issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Granted scope, omitted when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Returns the response as ordered pairs for redirect encoding.
    #[must_use]
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("access_token", self.access_token.clone()),
            ("token_type", self.token_type.clone()),
            ("expires_in", self.expires_in.to_string()),
        ];
        if let Some(refresh_token) = &self.refresh_token {
            params.push(("refresh_token", refresh_token.clone()));
        }
        if let Some(scope) = &self.scope {
            params.push(("scope", scope.clone()));
        }
        params
    }
}
