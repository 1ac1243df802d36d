//! Implicit grant (RFC 6749 Section 4.2).
//!
//! The access token is returned in the redirect URI fragment. Only public
//! clients (`token_endpoint_auth_method = none`) may use it and no refresh
//! token is ever issued.

use async_trait::async_trait;

use crate::error::{OAuth2Error, OAuth2Result};
use crate::oauth::consent::Grant;
use crate::oauth::grants::{AuthorizationGrant, GrantContext};
use crate::oauth::request::OAuth2Request;
use crate::oauth::response::{OAuth2Response, add_params_to_uri};
use crate::types::{GrantType, ResponseMode, ResponseType, TokenEndpointAuthMethod, User};

/// Handler for `response_type=token`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImplicitGrant;

#[async_trait]
impl AuthorizationGrant for ImplicitGrant {
    fn response_type(&self) -> ResponseType {
        ResponseType::Token
    }

    async fn validate_authorization_request(
        &self,
        ctx: &GrantContext,
        request: &OAuth2Request,
    ) -> OAuth2Result<Grant> {
        let state = request.state();
        let client = ctx.query_authorization_client(request).await?;

        if !client.check_endpoint_auth_method(TokenEndpointAuthMethod::None) {
            tracing::warn!(client_id = %client.client_id, "Confidential client used the implicit grant");
            return Err(OAuth2Error::invalid_client(
                "The implicit grant is only available to public clients",
            )
            .with_state(state));
        }

        let redirect_uri = ctx.resolve_redirect_uri(&client, request)?;
        let redirect = |err: OAuth2Error| {
            err.with_state(state)
                .with_redirect(redirect_uri.clone(), ResponseMode::Fragment)
        };

        if !client.check_response_type(ResponseType::Token) {
            return Err(redirect(OAuth2Error::unauthorized_client(
                "The client is not authorized to use \"response_type=token\"",
            )));
        }
        if !client.check_grant_type(GrantType::Implicit) {
            return Err(redirect(OAuth2Error::unauthorized_client(
                "The client is not authorized to use \"grant_type=implicit\"",
            )));
        }

        let response_mode = ctx
            .resolve_response_mode(request, ResponseMode::Fragment, &[ResponseMode::Fragment])
            .map_err(redirect)?;

        let scope = request.scope();
        ctx.validate_requested_scope(&scope).map_err(redirect)?;

        Ok(Grant {
            client,
            response_type: ResponseType::Token,
            redirect_uri,
            requested_redirect_uri: request.redirect_uri().map(str::to_owned),
            response_mode,
            scope,
            state: state.map(str::to_owned),
            nonce: request.nonce().map(str::to_owned),
            code_challenge: None,
            code_challenge_method: None,
            prompt: None,
        })
    }

    async fn create_authorization_response(
        &self,
        ctx: &GrantContext,
        grant: &Grant,
        user: &User,
    ) -> OAuth2Result<OAuth2Response> {
        let scope = grant.client.allowed_scope(&grant.scope);
        let token = ctx
            .issue_token(&grant.client, GrantType::Implicit, Some(user), &scope, false)
            .await
            .map_err(|e| grant.redirect_error(e))?;

        let mut params = token.to_response().to_params();
        if let Some(state) = &grant.state {
            params.push(("state", state.clone()));
        }
        let location = add_params_to_uri(&grant.redirect_uri, params, grant.response_mode)
            .map_err(|e| {
                tracing::error!(error = %e, "Registered redirect URI is not absolute");
                OAuth2Error::server_error("Invalid redirect URI")
            })?;
        Ok(OAuth2Response::redirect(location))
    }
}
