//! Authorization code grant (RFC 6749 Section 4.1) with PKCE (RFC 7636).
//!
//! The authorization endpoint issues a single-use code bound to the client,
//! the user, the redirect URI, the scope and an optional PKCE challenge.
//! The token endpoint consumes the code exactly once and issues tokens.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::{OAuth2Error, OAuth2Result};
use crate::oauth::consent::Grant;
use crate::oauth::generator::generate_token;
use crate::oauth::grants::{
    AuthorizationGrant, GrantContext, PreviousCredential, TokenGrant, ValidatedTokenRequest,
    check_client_grant_type,
};
use crate::oauth::pkce::{PkceChallenge, PkceChallengeMethod, PkceVerifier};
use crate::oauth::request::OAuth2Request;
use crate::oauth::response::{OAuth2Response, add_params_to_uri};
use crate::oauth::scope::Scope;
use crate::types::{
    AuthorizationCode, GrantType, ResponseMode, ResponseType, TokenEndpointAuthMethod, User,
};

const AUTH_METHODS: &[TokenEndpointAuthMethod] = &[
    TokenEndpointAuthMethod::ClientSecretBasic,
    TokenEndpointAuthMethod::ClientSecretPost,
    TokenEndpointAuthMethod::ClientSecretJwt,
    TokenEndpointAuthMethod::PrivateKeyJwt,
    TokenEndpointAuthMethod::None,
];

/// Handler for `response_type=code` and `grant_type=authorization_code`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationCodeGrant;

impl AuthorizationCodeGrant {
    fn validate_code_challenge(
        ctx: &GrantContext,
        request: &OAuth2Request,
        is_public: bool,
    ) -> OAuth2Result<(Option<String>, Option<PkceChallengeMethod>)> {
        let Some(challenge) = request.code_challenge() else {
            if request.code_challenge_method().is_some() {
                return Err(OAuth2Error::invalid_request(
                    "Missing \"code_challenge\" in request",
                ));
            }
            if is_public && ctx.config.pkce.require_for_public_clients {
                return Err(OAuth2Error::invalid_request(
                    "Missing \"code_challenge\" in request",
                ));
            }
            return Ok((None, None));
        };

        let challenge = PkceChallenge::new(challenge.to_string())?;
        // RFC 7636 Section 4.3: an omitted method means "plain".
        let method = PkceChallengeMethod::parse(
            request.code_challenge_method().unwrap_or("plain"),
            ctx.config.pkce.allow_plain,
        )?;
        Ok((Some(challenge.as_str().to_string()), Some(method)))
    }

    fn verify_code_verifier(code: &AuthorizationCode, request: &OAuth2Request) -> OAuth2Result<()> {
        let verifier = request.code_verifier();
        let Some(challenge) = &code.code_challenge else {
            if verifier.is_some() {
                return Err(OAuth2Error::invalid_request(
                    "Unexpected \"code_verifier\" in request",
                ));
            }
            return Ok(());
        };

        let verifier = verifier
            .ok_or_else(|| OAuth2Error::invalid_request("Missing \"code_verifier\" in request"))?;
        let verifier = PkceVerifier::new(verifier.to_string())?;
        let method = match code.code_challenge_method.as_deref() {
            Some("plain") => PkceChallengeMethod::Plain,
            _ => PkceChallengeMethod::S256,
        };
        PkceChallenge::new(challenge.clone())?.verify(method, &verifier)?;
        Ok(())
    }
}

#[async_trait]
impl AuthorizationGrant for AuthorizationCodeGrant {
    fn response_type(&self) -> ResponseType {
        ResponseType::Code
    }

    async fn validate_authorization_request(
        &self,
        ctx: &GrantContext,
        request: &OAuth2Request,
    ) -> OAuth2Result<Grant> {
        let state = request.state();
        let client = ctx.query_authorization_client(request).await?;
        let redirect_uri = ctx.resolve_redirect_uri(&client, request)?;

        let response_mode = ctx
            .resolve_response_mode(
                request,
                ResponseMode::Query,
                &[ResponseMode::Query, ResponseMode::Fragment],
            )
            .map_err(|e| {
                e.with_state(state)
                    .with_redirect(redirect_uri.clone(), ResponseMode::Query)
            })?;
        let redirect = |err: OAuth2Error| {
            err.with_state(state)
                .with_redirect(redirect_uri.clone(), response_mode)
        };

        if !client.check_response_type(ResponseType::Code) {
            return Err(redirect(OAuth2Error::unauthorized_client(
                "The client is not authorized to use \"response_type=code\"",
            )));
        }
        if !client.check_grant_type(GrantType::AuthorizationCode) {
            return Err(redirect(OAuth2Error::unauthorized_client(
                "The client is not authorized to use \"grant_type=authorization_code\"",
            )));
        }

        let scope = request.scope();
        ctx.validate_requested_scope(&scope).map_err(redirect)?;

        let (code_challenge, code_challenge_method) =
            Self::validate_code_challenge(ctx, request, client.is_public()).map_err(redirect)?;

        Ok(Grant {
            client,
            response_type: ResponseType::Code,
            redirect_uri,
            requested_redirect_uri: request.redirect_uri().map(str::to_owned),
            response_mode,
            scope,
            state: state.map(str::to_owned),
            nonce: request.nonce().map(str::to_owned),
            code_challenge,
            code_challenge_method,
            prompt: None,
        })
    }

    async fn create_authorization_response(
        &self,
        ctx: &GrantContext,
        grant: &Grant,
        user: &User,
    ) -> OAuth2Result<OAuth2Response> {
        let now = OffsetDateTime::now_utc();
        let lifetime = time::Duration::try_from(ctx.config.authorization_code.lifetime)
            .unwrap_or(time::Duration::MAX);
        let code = AuthorizationCode {
            code: generate_token(ctx.config.authorization_code.code_length),
            client_id: grant.client.client_id.clone(),
            user_id: user.id.clone(),
            redirect_uri: grant.requested_redirect_uri.clone(),
            scope: grant.scope.to_string(),
            nonce: grant.nonce.clone(),
            code_challenge: grant.code_challenge.clone(),
            code_challenge_method: grant
                .code_challenge_method
                .map(|m| m.as_str().to_string()),
            auth_time: now,
            expires_at: now.saturating_add(lifetime),
        };

        let codes = ctx.codes().map_err(|e| grant.redirect_error(e))?;
        codes
            .save_code(&code)
            .await
            .map_err(|e| grant.redirect_error(e.into()))?;
        tracing::info!(
            client_id = %code.client_id,
            user_id = %code.user_id,
            pkce = code.code_challenge.is_some(),
            "Authorization code issued"
        );

        let mut params = vec![("code", code.code)];
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

#[async_trait]
impl TokenGrant for AuthorizationCodeGrant {
    fn grant_type(&self) -> GrantType {
        GrantType::AuthorizationCode
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
        check_client_grant_type(&client, GrantType::AuthorizationCode)?;

        let code_value = request
            .code()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing \"code\" in request"))?;

        // Consumed before the remaining checks so a failed attempt burns it.
        let code = ctx
            .codes()?
            .consume_code(code_value)
            .await?
            .filter(|code| code.client_id == client.client_id)
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid \"code\" in request"))?;

        if code.is_expired() {
            return Err(OAuth2Error::invalid_grant("The \"code\" has expired"));
        }

        if let Some(expected) = &code.redirect_uri
            && request.redirect_uri() != Some(expected.as_str())
        {
            return Err(OAuth2Error::invalid_grant("Invalid \"redirect_uri\" in request"));
        }

        Self::verify_code_verifier(&code, request)?;

        let user = ctx
            .users()?
            .find_user(&code.user_id)
            .await?
            .filter(|user| user.active)
            .ok_or_else(|| OAuth2Error::invalid_grant("The resource owner is no longer valid"))?;

        let scope = client.allowed_scope(&Scope::parse(&code.scope));
        let include_refresh_token = client.check_grant_type(GrantType::RefreshToken);
        Ok(ValidatedTokenRequest {
            client,
            grant_type: GrantType::AuthorizationCode,
            user: Some(user),
            scope,
            include_refresh_token,
            previous: PreviousCredential::None,
        })
    }
}
