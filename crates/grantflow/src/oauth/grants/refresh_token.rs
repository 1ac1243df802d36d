//! Refresh token grant (RFC 6749 Section 6).
//!
//! The new access token inherits the original scope or a narrower one. With
//! rotation enabled the old record is revoked before a new refresh token is
//! issued, so only one of several concurrent redemptions succeeds; otherwise
//! the old refresh token stays usable.

use async_trait::async_trait;

use crate::error::{OAuth2Error, OAuth2Result};
use crate::oauth::grants::{
    GrantContext, PreviousCredential, TokenGrant, ValidatedTokenRequest, check_client_grant_type,
    token_json_response,
};
use crate::oauth::request::OAuth2Request;
use crate::oauth::response::OAuth2Response;
use crate::oauth::scope::Scope;
use crate::types::{GrantType, TokenEndpointAuthMethod, TokenTypeHint};

const AUTH_METHODS: &[TokenEndpointAuthMethod] = &[
    TokenEndpointAuthMethod::ClientSecretBasic,
    TokenEndpointAuthMethod::ClientSecretPost,
    TokenEndpointAuthMethod::ClientSecretJwt,
    TokenEndpointAuthMethod::PrivateKeyJwt,
    TokenEndpointAuthMethod::None,
];

/// Handler for `grant_type=refresh_token`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshTokenGrant;

#[async_trait]
impl TokenGrant for RefreshTokenGrant {
    fn grant_type(&self) -> GrantType {
        GrantType::RefreshToken
    }

    fn auth_methods(&self) -> &[TokenEndpointAuthMethod] {
        AUTH_METHODS
    }

    async fn validate_token_request(
        &self,
        ctx: &GrantContext,
        request: &OAuth2Request,
    ) -> OAuth2Result<ValidatedTokenRequest> {
        let client = ctx
            .authenticate_client(request, self.auth_methods())
            .await?
            .client;
        check_client_grant_type(&client, GrantType::RefreshToken)?;

        let value = request
            .refresh_token()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing \"refresh_token\" in request"))?;

        let previous = ctx
            .tokens
            .query_token(value, Some(TokenTypeHint::RefreshToken))
            .await?
            .filter(|token| token.is_refresh_active() && token.check_client(&client.client_id))
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid \"refresh_token\" in request"))?;

        let original = Scope::parse(&previous.scope);
        let requested = request.scope();
        let scope = if requested.is_empty() {
            original
        } else if requested.is_subset_of(&original) {
            requested
        } else {
            return Err(OAuth2Error::invalid_scope(
                "The requested scope exceeds the originally granted scope",
            ));
        };

        let user = match &previous.user_id {
            Some(user_id) => Some(
                ctx.users()?
                    .find_user(user_id)
                    .await?
                    .filter(|user| user.active)
                    .ok_or_else(|| {
                        OAuth2Error::invalid_grant("The resource owner is no longer valid")
                    })?,
            ),
            None => None,
        };

        Ok(ValidatedTokenRequest {
            client,
            grant_type: GrantType::RefreshToken,
            user,
            scope,
            include_refresh_token: ctx.config.tokens.rotate_refresh_tokens,
            previous: PreviousCredential::RefreshToken(Box::new(previous)),
        })
    }

    async fn create_token_response(
        &self,
        ctx: &GrantContext,
        validated: ValidatedTokenRequest,
    ) -> OAuth2Result<OAuth2Response> {
        if validated.include_refresh_token
            && let PreviousCredential::RefreshToken(previous) = &validated.previous
        {
            if !ctx.tokens.revoke_token(&previous.access_token).await? {
                tracing::warn!(
                    client_id = %validated.client.client_id,
                    "Refresh token redeemed twice"
                );
                return Err(OAuth2Error::invalid_grant("The refresh token was already used"));
            }
            tracing::debug!(client_id = %validated.client.client_id, "Rotated refresh token");
        }

        let token = ctx
            .issue_token(
                &validated.client,
                GrantType::RefreshToken,
                validated.user.as_ref(),
                &validated.scope,
                validated.include_refresh_token,
            )
            .await?;

        Ok(token_json_response(&token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::error::ErrorCode;
    use crate::oauth::grants::test_support::{Stores, context};
    use crate::storage::TokenStore;
    use crate::types::{Client, User};
    use axum::http::Method;
    use std::sync::Arc;

    fn client() -> Client {
        Client::new("app")
            .with_auth_method(TokenEndpointAuthMethod::None)
            .with_grant_types([GrantType::Password, GrantType::RefreshToken])
            .with_scope("profile email")
    }

    async fn setup(config: ServerConfig) -> (Arc<Stores>, crate::oauth::grants::GrantContext, String, String) {
        let stores = Arc::new(
            Stores::default()
                .with_client(client())
                .with_user(User::new("1", "foo"), "pw"),
        );
        let ctx = context(&stores, config);
        let token = ctx
            .issue_token(
                &client(),
                GrantType::Password,
                Some(&User::new("1", "foo")),
                &Scope::parse("profile email"),
                true,
            )
            .await
            .unwrap();
        let refresh = token.refresh_token.clone().unwrap();
        (stores, ctx, token.access_token, refresh)
    }

    fn request(refresh: &str, scope: Option<&str>) -> OAuth2Request {
        let mut request = OAuth2Request::new(Method::POST, "/token").with_params([
            ("grant_type", "refresh_token"),
            ("client_id", "app"),
            ("refresh_token", refresh),
        ]);
        if let Some(scope) = scope {
            request = request.with_param("scope", scope);
        }
        request
    }

    #[tokio::test]
    async fn test_rotation_redeems_once() {
        let (stores, ctx, _, refresh) = setup(ServerConfig::default()).await;

        let first = RefreshTokenGrant
            .validate_token_request(&ctx, &request(&refresh, None))
            .await
            .unwrap();
        let second = RefreshTokenGrant
            .validate_token_request(&ctx, &request(&refresh, None))
            .await
            .unwrap();

        let response = RefreshTokenGrant
            .create_token_response(&ctx, first)
            .await
            .unwrap();
        assert_eq!(response.status, axum::http::StatusCode::OK);

        let err = RefreshTokenGrant
            .create_token_response(&ctx, second)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidGrant);
        assert_eq!(stores.token_count(), 2);
    }

    #[tokio::test]
    async fn test_rotation_revokes_previous() {
        let (stores, ctx, access, refresh) = setup(ServerConfig::default()).await;

        let validated = RefreshTokenGrant
            .validate_token_request(&ctx, &request(&refresh, Some("profile")))
            .await
            .unwrap();
        assert_eq!(validated.scope.to_string(), "profile");

        let response = RefreshTokenGrant
            .create_token_response(&ctx, validated)
            .await
            .unwrap();
        let body = response.json_body().unwrap();
        assert_ne!(body["refresh_token"].as_str().unwrap(), refresh);

        let old = stores.query_token(&access, None).await.unwrap().unwrap();
        assert!(old.is_revoked());

        let err = RefreshTokenGrant
            .validate_token_request(&ctx, &request(&refresh, None))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidGrant);
    }

    #[tokio::test]
    async fn test_without_rotation() {
        let mut config = ServerConfig::default();
        config.tokens.rotate_refresh_tokens = false;
        let (_, ctx, _, refresh) = setup(config).await;

        let validated = RefreshTokenGrant
            .validate_token_request(&ctx, &request(&refresh, None))
            .await
            .unwrap();
        assert_eq!(validated.scope.to_string(), "profile email");
        let response = RefreshTokenGrant
            .create_token_response(&ctx, validated)
            .await
            .unwrap();
        assert!(response.json_body().unwrap().get("refresh_token").is_none());

        assert!(
            RefreshTokenGrant
                .validate_token_request(&ctx, &request(&refresh, None))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_broader_scope_rejected() {
        let (_, ctx, _, refresh) = setup(ServerConfig::default()).await;
        let err = RefreshTokenGrant
            .validate_token_request(&ctx, &request(&refresh, Some("profile admin")))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidScope);
    }

    #[tokio::test]
    async fn test_unknown_and_missing_token() {
        let (_, ctx, _, _) = setup(ServerConfig::default()).await;
        let err = RefreshTokenGrant
            .validate_token_request(&ctx, &request("nope", None))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidGrant);

        let request = OAuth2Request::new(Method::POST, "/token")
            .with_params([("grant_type", "refresh_token"), ("client_id", "app")]);
        let err = RefreshTokenGrant
            .validate_token_request(&ctx, &request)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }
}
