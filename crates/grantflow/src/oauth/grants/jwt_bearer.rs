//! JWT bearer assertion grant (RFC 7523 Section 2.1).
//!
//! The assertion is signed by a registered client (its `iss`) and names the
//! resource owner in `sub`. The signature authenticates the issuing client,
//! so no separate client credentials are read. No refresh token is issued.

use async_trait::async_trait;

use crate::error::{OAuth2Error, OAuth2Result};
use crate::oauth::assertion::{peek_issuer, verify_assertion};
use crate::oauth::grants::{
    GrantContext, PreviousCredential, TokenGrant, ValidatedTokenRequest, check_client_grant_type,
};
use crate::oauth::request::OAuth2Request;
use crate::types::{GrantType, TokenEndpointAuthMethod};

/// Handler for `grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtBearerGrant;

#[async_trait]
impl TokenGrant for JwtBearerGrant {
    fn grant_type(&self) -> GrantType {
        GrantType::JwtBearer
    }

    fn auth_methods(&self) -> &[TokenEndpointAuthMethod] {
        &[]
    }

    async fn validate_token_request(
        &self,
        ctx: &GrantContext,
        request: &OAuth2Request,
    ) -> OAuth2Result<ValidatedTokenRequest> {
        let assertion = request
            .assertion()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing \"assertion\" in request"))?;

        let issuer = peek_issuer(assertion)
            .ok_or_else(|| OAuth2Error::invalid_grant("Missing \"iss\" in assertion"))?;

        let client = match ctx.clients.get_client(&issuer).await? {
            Some(client) if client.active => client,
            _ => {
                tracing::warn!(client_id = %issuer, "Assertion issued by an unknown client");
                return Err(OAuth2Error::invalid_client("Invalid assertion issuer"));
            }
        };
        check_client_grant_type(&client, GrantType::JwtBearer)?;

        let claims = verify_assertion(
            assertion,
            &client,
            None,
            ctx.config.token_endpoint.as_deref(),
            &ctx.config.assertions,
        )
        .map_err(|e| {
            tracing::warn!(client_id = %client.client_id, error = %e, "Assertion rejected");
            OAuth2Error::invalid_grant(e.to_string())
        })?;

        let user = match claims.sub.as_deref() {
            Some(subject) => Some(
                ctx.users()?
                    .find_user(subject)
                    .await?
                    .filter(|user| user.active)
                    .ok_or_else(|| OAuth2Error::invalid_grant("Invalid \"sub\" value in assertion"))?,
            ),
            None => None,
        };

        let requested = request.scope();
        ctx.validate_requested_scope(&requested)?;

        Ok(ValidatedTokenRequest {
            scope: client.allowed_scope(&requested),
            client,
            grant_type: GrantType::JwtBearer,
            user,
            include_refresh_token: false,
            previous: PreviousCredential::None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::error::ErrorCode;
    use crate::oauth::assertion::tests::sign_hs256;
    use crate::oauth::grants::test_support::{Stores, context};
    use crate::types::{Client, User};
    use axum::http::Method;
    use std::sync::Arc;
    use time::OffsetDateTime;

    const SECRET: &str = "issuer-shared-secret-long-enough";

    fn setup() -> GrantContext {
        let client = Client::new("issuer")
            .with_secret(SECRET)
            .with_grant_types([GrantType::JwtBearer])
            .with_scope("profile");
        let stores = Arc::new(
            Stores::default()
                .with_client(client)
                .with_user(User::new("1", "foo"), "pw"),
        );
        context(
            &stores,
            ServerConfig::default().with_token_endpoint("https://auth.example.com/oauth/token"),
        )
    }

    fn request(assertion: &str) -> OAuth2Request {
        OAuth2Request::new(Method::POST, "/token").with_params([
            ("grant_type", GrantType::JwtBearer.as_str()),
            ("assertion", assertion),
            ("scope", "profile"),
        ])
    }

    fn claims(sub: &str, aud: &str) -> serde_json::Value {
        serde_json::json!({
            "iss": "issuer",
            "sub": sub,
            "aud": aud,
            "exp": OffsetDateTime::now_utc().unix_timestamp() + 120,
        })
    }

    #[tokio::test]
    async fn test_valid_assertion() {
        let ctx = setup();
        let assertion = sign_hs256(SECRET, &claims("1", "https://auth.example.com/oauth/token"));
        let validated = JwtBearerGrant
            .validate_token_request(&ctx, &request(&assertion))
            .await
            .unwrap();
        assert_eq!(validated.user.unwrap().id, "1");
        assert_eq!(validated.scope.to_string(), "profile");
        assert!(!validated.include_refresh_token);
    }

    #[tokio::test]
    async fn test_unknown_subject() {
        let ctx = setup();
        let assertion = sign_hs256(SECRET, &claims("404", "https://auth.example.com/oauth/token"));
        let err = JwtBearerGrant
            .validate_token_request(&ctx, &request(&assertion))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidGrant);
    }

    #[tokio::test]
    async fn test_wrong_audience() {
        let ctx = setup();
        let assertion = sign_hs256(SECRET, &claims("1", "https://other.example.com"));
        let err = JwtBearerGrant
            .validate_token_request(&ctx, &request(&assertion))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidGrant);
    }

    #[tokio::test]
    async fn test_missing_assertion() {
        let ctx = setup();
        let request = OAuth2Request::new(Method::POST, "/token")
            .with_param("grant_type", GrantType::JwtBearer.as_str());
        let err = JwtBearerGrant
            .validate_token_request(&ctx, &request)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn test_unknown_issuer() {
        let ctx = setup();
        let assertion = sign_hs256(
            SECRET,
            &serde_json::json!({
                "iss": "stranger",
                "exp": OffsetDateTime::now_utc().unix_timestamp() + 60
            }),
        );
        let err = JwtBearerGrant
            .validate_token_request(&ctx, &request(&assertion))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidClient);
    }
}
