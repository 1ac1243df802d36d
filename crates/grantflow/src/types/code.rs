//! Authorization code records.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single-use authorization code bound to client, user, redirect URI,
/// scope and an optional PKCE challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The opaque code value.
    pub code: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// The user who approved the request.
    pub user_id: String,

    /// The `redirect_uri` from the authorization request, if one was sent.
    ///
    /// When present the token request must repeat it exactly.
    pub redirect_uri: Option<String>,

    /// Granted scope, space-delimited.
    pub scope: String,

    /// Nonce from the authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// PKCE code challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method (`S256` or `plain`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// When the user approved the request.
    #[serde(with = "time::serde::rfc3339")]
    pub auth_time: OffsetDateTime,

    /// When the code stops being redeemable.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthorizationCode {
    /// Returns `true` if the code is past its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }
}
