//! Resource owner password credentials grant (RFC 6749 Section 4.3).

use async_trait::async_trait;

use crate::error::{OAuth2Error, OAuth2Result};
use crate::oauth::grants::{
    GrantContext, PreviousCredential, TokenGrant, ValidatedTokenRequest, check_client_grant_type,
};
use crate::oauth::request::OAuth2Request;
use crate::types::{GrantType, TokenEndpointAuthMethod};

const AUTH_METHODS: &[TokenEndpointAuthMethod] = &[
    TokenEndpointAuthMethod::ClientSecretBasic,
    TokenEndpointAuthMethod::ClientSecretPost,
    TokenEndpointAuthMethod::None,
];

/// Handler for `grant_type=password`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordGrant;

#[async_trait]
impl TokenGrant for PasswordGrant {
    fn grant_type(&self) -> GrantType {
        GrantType::Password
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
        check_client_grant_type(&client, GrantType::Password)?;

        let username = request
            .username()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing \"username\" in request"))?;
        let password = request
            .password()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing \"password\" in request"))?;

        let requested = request.scope();
        ctx.validate_requested_scope(&requested)?;

        let user = ctx
            .users()?
            .authenticate(username, password)
            .await?
            .filter(|user| user.active)
            .ok_or_else(|| {
                tracing::warn!(client_id = %client.client_id, "Resource owner authentication failed");
                OAuth2Error::invalid_grant("Invalid \"username\" or \"password\" in request")
            })?;

        Ok(ValidatedTokenRequest {
            scope: client.allowed_scope(&requested),
            include_refresh_token: client.check_grant_type(GrantType::RefreshToken),
            client,
            grant_type: GrantType::Password,
            user: Some(user),
            previous: PreviousCredential::None,
        })
    }
}
