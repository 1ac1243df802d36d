//! Client credentials grant (RFC 6749 Section 4.4).
//!
//! Confidential clients obtain a token on their own behalf. There is no
//! resource owner and no refresh token.

use async_trait::async_trait;

use crate::error::OAuth2Result;
use crate::oauth::grants::{
    GrantContext, PreviousCredential, TokenGrant, ValidatedTokenRequest, check_client_grant_type,
};
use crate::oauth::request::OAuth2Request;
use crate::types::{GrantType, TokenEndpointAuthMethod};

const AUTH_METHODS: &[TokenEndpointAuthMethod] = &[
    TokenEndpointAuthMethod::ClientSecretBasic,
    TokenEndpointAuthMethod::ClientSecretPost,
    TokenEndpointAuthMethod::ClientSecretJwt,
    TokenEndpointAuthMethod::PrivateKeyJwt,
];

/// Handler for `grant_type=client_credentials`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientCredentialsGrant;

#[async_trait]
impl TokenGrant for ClientCredentialsGrant {
    fn grant_type(&self) -> GrantType {
        GrantType::ClientCredentials
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
        check_client_grant_type(&client, GrantType::ClientCredentials)?;

        let requested = request.scope();
        ctx.validate_requested_scope(&requested)?;

        Ok(ValidatedTokenRequest {
            scope: client.allowed_scope(&requested),
            client,
            grant_type: GrantType::ClientCredentials,
            user: None,
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
    use crate::oauth::grants::test_support::{Stores, context};
    use crate::types::Client;
    use axum::http::Method;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use std::sync::Arc;

    fn service_client() -> Client {
        Client::new("svc")
            .with_secret("svc-secret")
            .with_grant_types([GrantType::ClientCredentials])
            .with_scope("read write")
    }

    fn request(query: &str, secret: &str) -> OAuth2Request {
        OAuth2Request::new(Method::POST, format!("/token?grant_type=client_credentials{query}"))
            .with_authorization(format!("Basic {}", STANDARD.encode(format!("svc:{secret}"))))
    }

    #[tokio::test]
    async fn test_issues_token_without_user() {
        let stores = Arc::new(Stores::default().with_client(service_client()));
        let ctx = context(&stores, ServerConfig::default());

        let validated = ClientCredentialsGrant
            .validate_token_request(&ctx, &request("&scope=read%20admin", "svc-secret"))
            .await
            .unwrap();
        assert!(validated.user.is_none());
        assert_eq!(validated.scope.to_string(), "read");

        let response = ClientCredentialsGrant
            .create_token_response(&ctx, validated)
            .await
            .unwrap();
        let body = response.json_body().unwrap();
        assert_eq!(body["expires_in"], 864_000);
        assert!(body.get("refresh_token").is_none());
    }

    #[tokio::test]
    async fn test_bad_secret() {
        let stores = Arc::new(Stores::default().with_client(service_client()));
        let ctx = context(&stores, ServerConfig::default());
        let err = ClientCredentialsGrant
            .validate_token_request(&ctx, &request("", "nope"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidClient);
    }

    #[tokio::test]
    async fn test_grant_not_allowed() {
        let client = service_client().with_grant_types([GrantType::Password]);
        let stores = Arc::new(Stores::default().with_client(client));
        let ctx = context(&stores, ServerConfig::default());
        let err = ClientCredentialsGrant
            .validate_token_request(&ctx, &request("", "svc-secret"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnauthorizedClient);
    }

    #[tokio::test]
    async fn test_public_client_rejected() {
        let client = Client::new("pub")
            .with_auth_method(TokenEndpointAuthMethod::None)
            .with_grant_types([GrantType::ClientCredentials]);
        let stores = Arc::new(Stores::default().with_client(client));
        let ctx = context(&stores, ServerConfig::default());
        let request = OAuth2Request::new(Method::POST, "/token").with_params([
            ("grant_type", "client_credentials"),
            ("client_id", "pub"),
        ]);
        let err = ClientCredentialsGrant
            .validate_token_request(&ctx, &request)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidClient);
    }
}
