//! Token introspection response (RFC 7662).

use serde::{Deserialize, Serialize};

use crate::types::{Token, User};

/// Token introspection response per RFC 7662 Section 2.2.
///
/// Inactive tokens are reported as `{"active": false}` with every other
/// member omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active (REQUIRED).
    pub active: bool,

    /// Space-separated scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client the token was issued to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Resource owner's login name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Token type, `Bearer`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Expiration time as Unix timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issue time as Unix timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Subject, the resource owner's id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl IntrospectionResponse {
    /// The response for unknown, expired, revoked or foreign tokens.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    /// The response for an active token.
    #[must_use]
    pub fn active(token: &Token, user: Option<&User>, refresh: bool) -> Self {
        let exp = if refresh {
            token.refresh_token_expires_at.map(|at| at.unix_timestamp())
        } else {
            Some(token.expires_at().unix_timestamp())
        };
        Self {
            active: true,
            scope: (!token.scope.is_empty()).then(|| token.scope.clone()),
            client_id: Some(token.client_id.clone()),
            username: user.map(|u| u.username.clone()),
            token_type: Some(token.token_type.clone()),
            exp,
            iat: Some(token.issued_at.unix_timestamp()),
            sub: token.user_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_serializes_minimal() {
        let json = serde_json::to_value(IntrospectionResponse::inactive()).unwrap();
        assert_eq!(json, serde_json::json!({ "active": false }));
    }
}
