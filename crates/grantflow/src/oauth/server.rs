//! Authorization server.
//!
//! [`AuthorizationServer`] owns the configuration, the stores and the grant
//! registries. It dispatches authorization requests by `response_type` and
//! token requests by `grant_type`, enforces transport security and renders
//! every [`OAuth2Error`] as a redirect or an inline JSON body.
//!
//! # Usage
//!
//! ```ignore
//! let server = AuthorizationServer::builder()
//!     .config(ServerConfig::default())
//!     .clients(store.clone())
//!     .tokens(store.clone())
//!     .users(store.clone())
//!     .with_default_grants()
//!     .build()?;
//!
//! let response = server.create_token_response(&request).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{ConfigError, ServerConfig};
use crate::error::{OAuth2Error, OAuth2Result};
use crate::oauth::client_auth::authenticate_client;
use crate::oauth::consent::{Grant, Prompt};
use crate::oauth::generator::{BearerTokenGenerator, TokenGenerator};
use crate::oauth::grants::device_code::{DeviceAuthorizationResponse, device_authorization_json};
use crate::oauth::grants::{
    AuthorizationCodeGrant, AuthorizationGrant, ClientCredentialsGrant, DeviceCodeGrant,
    GrantContext, ImplicitGrant, JwtBearerGrant, PasswordGrant, RefreshTokenGrant, TokenGrant,
};
use crate::oauth::introspection::IntrospectionResponse;
use crate::oauth::request::OAuth2Request;
use crate::oauth::response::{OAuth2Response, add_params_to_uri};
use crate::storage::{AuthorizationCodeStore, ClientStore, DeviceStore, TokenStore, UserStore};
use crate::types::{
    GrantType, ResponseMode, ResponseType, Token, TokenEndpointAuthMethod, TokenTypeHint, User,
};

/// Every method is accepted at the revocation and introspection endpoints.
const ENDPOINT_AUTH_METHODS: &[TokenEndpointAuthMethod] = &[
    TokenEndpointAuthMethod::ClientSecretBasic,
    TokenEndpointAuthMethod::ClientSecretPost,
    TokenEndpointAuthMethod::ClientSecretJwt,
    TokenEndpointAuthMethod::PrivateKeyJwt,
    TokenEndpointAuthMethod::None,
];

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`AuthorizationServer`].
#[derive(Default)]
pub struct AuthorizationServerBuilder {
    config: ServerConfig,
    clients: Option<Arc<dyn ClientStore>>,
    tokens: Option<Arc<dyn TokenStore>>,
    codes: Option<Arc<dyn AuthorizationCodeStore>>,
    users: Option<Arc<dyn UserStore>>,
    devices: Option<Arc<dyn DeviceStore>>,
    token_generator: Option<Arc<dyn TokenGenerator>>,
    authorization_grants: Vec<Box<dyn AuthorizationGrant>>,
    token_grants: Vec<Box<dyn TokenGrant>>,
}

impl AuthorizationServerBuilder {
    /// Sets the server configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the client store (required).
    #[must_use]
    pub fn clients(mut self, store: Arc<dyn ClientStore>) -> Self {
        self.clients = Some(store);
        self
    }

    /// Sets the token store (required).
    #[must_use]
    pub fn tokens(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(store);
        self
    }

    /// Sets the authorization code store.
    #[must_use]
    pub fn codes(mut self, store: Arc<dyn AuthorizationCodeStore>) -> Self {
        self.codes = Some(store);
        self
    }

    /// Sets the user store.
    #[must_use]
    pub fn users(mut self, store: Arc<dyn UserStore>) -> Self {
        self.users = Some(store);
        self
    }

    /// Sets the device store.
    #[must_use]
    pub fn devices(mut self, store: Arc<dyn DeviceStore>) -> Self {
        self.devices = Some(store);
        self
    }

    /// Replaces the access token generator.
    #[must_use]
    pub fn token_generator(mut self, generator: Arc<dyn TokenGenerator>) -> Self {
        self.token_generator = Some(generator);
        self
    }

    /// Registers a grant for the authorization endpoint. A later grant for
    /// the same `response_type` replaces an earlier one.
    #[must_use]
    pub fn register_authorization_grant(mut self, grant: impl AuthorizationGrant + 'static) -> Self {
        self.authorization_grants.push(Box::new(grant));
        self
    }

    /// Registers a grant for the token endpoint. A later grant for the same
    /// `grant_type` replaces an earlier one.
    #[must_use]
    pub fn register_token_grant(mut self, grant: impl TokenGrant + 'static) -> Self {
        self.token_grants.push(Box::new(grant));
        self
    }

    /// Registers every built-in grant.
    #[must_use]
    pub fn with_default_grants(self) -> Self {
        self.register_authorization_grant(ImplicitGrant)
            .register_authorization_grant(AuthorizationCodeGrant)
            .register_token_grant(AuthorizationCodeGrant)
            .register_token_grant(ClientCredentialsGrant)
            .register_token_grant(PasswordGrant)
            .register_token_grant(RefreshTokenGrant)
            .register_token_grant(DeviceCodeGrant)
            .register_token_grant(JwtBearerGrant)
    }

    /// Validates the configuration and builds the server.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the configuration is invalid or
    /// the client or token store is missing.
    pub fn build(self) -> Result<AuthorizationServer, ConfigError> {
        self.config.validate()?;
        let clients = self
            .clients
            .ok_or_else(|| ConfigError::InvalidValue("a client store is required".to_string()))?;
        let tokens = self
            .tokens
            .ok_or_else(|| ConfigError::InvalidValue("a token store is required".to_string()))?;

        let mut generator = BearerTokenGenerator::new(self.config.tokens.clone());
        if let Some(access) = self.token_generator {
            generator = generator.with_access_generator(access);
        }

        let authorization_grants: HashMap<_, _> = self
            .authorization_grants
            .into_iter()
            .map(|grant| (grant.response_type(), grant))
            .collect();
        let token_grants: HashMap<_, _> = self
            .token_grants
            .into_iter()
            .map(|grant| (grant.grant_type(), grant))
            .collect();

        tracing::debug!(
            response_types = ?authorization_grants.keys().map(ResponseType::as_str).collect::<Vec<_>>(),
            grant_types = ?token_grants.keys().map(GrantType::as_str).collect::<Vec<_>>(),
            "Authorization server built"
        );

        Ok(AuthorizationServer {
            ctx: GrantContext {
                config: self.config,
                clients,
                tokens,
                codes: self.codes,
                users: self.users,
                devices: self.devices,
                generator,
            },
            authorization_grants,
            token_grants,
        })
    }
}

// =============================================================================
// Server
// =============================================================================

/// OAuth 2.0 authorization server.
///
/// Immutable after construction and safe to share across tasks behind an
/// [`Arc`].
pub struct AuthorizationServer {
    ctx: GrantContext,
    authorization_grants: HashMap<ResponseType, Box<dyn AuthorizationGrant>>,
    token_grants: HashMap<GrantType, Box<dyn TokenGrant>>,
}

impl std::fmt::Debug for AuthorizationServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationServer")
            .field("ctx", &self.ctx)
            .field("response_types", &self.authorization_grants.keys())
            .field("grant_types", &self.token_grants.keys())
            .finish()
    }
}

impl AuthorizationServer {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> AuthorizationServerBuilder {
        AuthorizationServerBuilder::default()
    }

    /// The server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.ctx.config
    }

    /// The context shared with grant handlers.
    #[must_use]
    pub fn context(&self) -> &GrantContext {
        &self.ctx
    }

    fn check_transport(&self, request: &OAuth2Request) -> OAuth2Result<()> {
        if request.is_secure() || self.ctx.config.allow_insecure_transport {
            Ok(())
        } else {
            Err(OAuth2Error::invalid_request("OAuth 2 MUST utilize https."))
        }
    }

    /// Adds the configured `error_uri` unless the error already carries one.
    fn decorate(&self, mut err: OAuth2Error) -> OAuth2Error {
        if err.uri.is_none()
            && let Some(uri) = self.ctx.config.error_uri(err.code)
        {
            err.uri = Some(uri.to_string());
        }
        err
    }

    // -------------------------------------------------------------------------
    // Authorization endpoint
    // -------------------------------------------------------------------------

    /// Validates an authorization request before the end user decides.
    ///
    /// The returned [`Grant`] carries a [`Prompt`] when the hosting
    /// application must show a login or consent page first.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` over insecure transport,
    /// `unsupported_response_type` for unknown response types, and any error
    /// raised by the grant. Errors are decorated with configured error URIs.
    pub async fn validate_consent_request(
        &self,
        request: &OAuth2Request,
        end_user: Option<&User>,
    ) -> OAuth2Result<Grant> {
        self.validate_authorization(request, end_user)
            .await
            .map_err(|err| self.decorate(err))
    }

    async fn validate_authorization(
        &self,
        request: &OAuth2Request,
        end_user: Option<&User>,
    ) -> OAuth2Result<Grant> {
        self.check_transport(request)?;
        let grant = self.authorization_grant(request)?;
        let mut validated = grant.validate_authorization_request(&self.ctx, request).await?;

        validated.prompt = request.prompt().and_then(Prompt::parse).or_else(|| {
            (end_user.is_none() && self.ctx.config.prompt_login_without_user)
                .then_some(Prompt::Login)
        });
        Ok(validated)
    }

    fn authorization_grant(&self, request: &OAuth2Request) -> OAuth2Result<&dyn AuthorizationGrant> {
        let state = request.state();
        let value = request.response_type().ok_or_else(|| {
            OAuth2Error::unsupported_response_type("Missing \"response_type\" in request")
                .with_state(state)
        })?;
        ResponseType::parse(value)
            .and_then(|response_type| self.authorization_grants.get(&response_type))
            .map(Box::as_ref)
            .ok_or_else(|| {
                OAuth2Error::unsupported_response_type(format!(
                    "response_type={value} is not supported"
                ))
                .with_state(state)
            })
    }

    /// Completes an authorization request with the end user's decision.
    ///
    /// `grant_user` is the approving user; `None` (or an inactive user)
    /// means the request was denied. Always returns a response: validation
    /// failures become redirects or inline errors per [`Self::handle_error`].
    pub async fn create_authorization_response(
        &self,
        request: &OAuth2Request,
        grant_user: Option<&User>,
    ) -> OAuth2Response {
        let result: OAuth2Result<OAuth2Response> = async {
            let grant = self.validate_authorization(request, grant_user).await?;
            let handler = self.authorization_grant(request)?;
            match grant_user {
                Some(user) if user.active => {
                    handler
                        .create_authorization_response(&self.ctx, &grant, user)
                        .await
                }
                _ => {
                    tracing::info!(client_id = %grant.client.client_id, "Authorization denied");
                    Err(grant.redirect_error(OAuth2Error::access_denied(
                        "The resource owner or authorization server denied the request",
                    )))
                }
            }
        }
        .await;

        result.unwrap_or_else(|err| self.handle_error(err))
    }

    // -------------------------------------------------------------------------
    // Token endpoint
    // -------------------------------------------------------------------------

    /// Handles a token request.
    pub async fn create_token_response(&self, request: &OAuth2Request) -> OAuth2Response {
        let span = tracing::info_span!(
            "token_request",
            request_id = %Uuid::new_v4(),
            grant_type = request.grant_type().unwrap_or_default(),
        );
        async {
            match self.token_response(request).await {
                Ok(response) => response,
                Err(err) => self.handle_error(err),
            }
        }
        .instrument(span)
        .await
    }

    async fn token_response(&self, request: &OAuth2Request) -> OAuth2Result<OAuth2Response> {
        self.check_transport(request)?;
        let grant = self.token_grant(request)?;
        let validated = grant.validate_token_request(&self.ctx, request).await?;
        grant.create_token_response(&self.ctx, validated).await
    }

    fn token_grant(&self, request: &OAuth2Request) -> OAuth2Result<&dyn TokenGrant> {
        let value = request.grant_type().unwrap_or_default();
        if request.method() != Method::POST {
            return Err(OAuth2Error::unsupported_grant_type(format!(
                "grant_type={value} is not supported"
            )));
        }
        GrantType::parse(value)
            .and_then(|grant_type| self.token_grants.get(&grant_type))
            .map(Box::as_ref)
            .ok_or_else(|| {
                OAuth2Error::unsupported_grant_type(format!("grant_type={value} is not supported"))
            })
    }

    // -------------------------------------------------------------------------
    // Device authorization endpoint
    // -------------------------------------------------------------------------

    fn check_device_grant(&self) -> OAuth2Result<()> {
        if self.token_grants.contains_key(&GrantType::DeviceCode) {
            Ok(())
        } else {
            Err(OAuth2Error::unsupported_grant_type(format!(
                "grant_type={} is not supported",
                GrantType::DeviceCode
            )))
        }
    }

    /// Handles a device authorization request (RFC 8628 Section 3.1).
    pub async fn create_device_authorization_response(
        &self,
        request: &OAuth2Request,
    ) -> OAuth2Response {
        let result: OAuth2Result<DeviceAuthorizationResponse> = async {
            self.check_transport(request)?;
            self.check_device_grant()?;
            DeviceCodeGrant
                .create_device_authorization(&self.ctx, request)
                .await
        }
        .await;

        match result {
            Ok(response) => device_authorization_json(&response),
            Err(err) => self.handle_error(err),
        }
    }

    /// Records that `user` approved the device authorization for `user_code`.
    ///
    /// # Errors
    ///
    /// See [`DeviceCodeGrant::record_decision`].
    pub async fn approve_device(&self, user_code: &str, user: &User) -> OAuth2Result<()> {
        self.check_device_grant()?;
        DeviceCodeGrant
            .record_decision(&self.ctx, user_code, Some(user))
            .await
    }

    /// Records that the user denied the device authorization for `user_code`.
    ///
    /// # Errors
    ///
    /// See [`DeviceCodeGrant::record_decision`].
    pub async fn deny_device(&self, user_code: &str) -> OAuth2Result<()> {
        self.check_device_grant()?;
        DeviceCodeGrant
            .record_decision(&self.ctx, user_code, None)
            .await
    }

    // -------------------------------------------------------------------------
    // Revocation and introspection
    // -------------------------------------------------------------------------

    /// Reads `token` and `token_type_hint` and finds the caller's own token,
    /// along with which of its two values was presented.
    async fn query_owned_token(
        &self,
        request: &OAuth2Request,
        client_id: &str,
    ) -> OAuth2Result<Option<(Token, TokenTypeHint)>> {
        let value = request
            .token()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing \"token\" in request"))?;
        let hint = request.token_type_hint().and_then(TokenTypeHint::parse);
        let token = self
            .ctx
            .tokens
            .query_token(value, hint)
            .await?
            .filter(|token| token.check_client(client_id));
        Ok(token.map(|token| {
            let kind = if token.access_token == value {
                TokenTypeHint::AccessToken
            } else {
                TokenTypeHint::RefreshToken
            };
            (token, kind)
        }))
    }

    /// Handles a revocation request (RFC 7009).
    ///
    /// Unknown tokens and tokens of other clients are ignored and still
    /// answered with `200 OK`.
    pub async fn create_revocation_response(&self, request: &OAuth2Request) -> OAuth2Response {
        let result: OAuth2Result<OAuth2Response> = async {
            self.check_transport(request)?;
            let client = authenticate_client(
                request,
                self.ctx.clients.as_ref(),
                &self.ctx.config,
                ENDPOINT_AUTH_METHODS,
            )
            .await?
            .client;

            if let Some(hint) = request.token_type_hint()
                && TokenTypeHint::parse(hint).is_none()
            {
                return Err(OAuth2Error::unsupported_token_type(format!(
                    "token_type_hint={hint} is not supported"
                )));
            }

            if let Some((token, _)) = self.query_owned_token(request, &client.client_id).await? {
                if self.ctx.tokens.revoke_token(&token.access_token).await? {
                    tracing::info!(client_id = %client.client_id, "Token revoked");
                }
            }
            Ok(OAuth2Response::ok())
        }
        .await;

        result.unwrap_or_else(|err| self.handle_error(err))
    }

    /// Handles an introspection request (RFC 7662).
    ///
    /// Only tokens issued to the authenticated client are reported active.
    pub async fn create_introspection_response(&self, request: &OAuth2Request) -> OAuth2Response {
        let result: OAuth2Result<OAuth2Response> = async {
            self.check_transport(request)?;
            let client = authenticate_client(
                request,
                self.ctx.clients.as_ref(),
                &self.ctx.config,
                ENDPOINT_AUTH_METHODS,
            )
            .await?
            .client;

            let body = match self.query_owned_token(request, &client.client_id).await? {
                Some((token, TokenTypeHint::RefreshToken)) if token.is_refresh_active() => {
                    self.introspect(&token, true).await?
                }
                Some((token, TokenTypeHint::AccessToken)) if token.is_active() => {
                    self.introspect(&token, false).await?
                }
                _ => IntrospectionResponse::inactive(),
            };
            Ok(OAuth2Response::json(
                StatusCode::OK,
                serde_json::to_value(body).unwrap_or_default(),
            ))
        }
        .await;

        result.unwrap_or_else(|err| self.handle_error(err))
    }

    async fn introspect(&self, token: &Token, refresh: bool) -> OAuth2Result<IntrospectionResponse> {
        let user = match (&token.user_id, &self.ctx.users) {
            (Some(user_id), Some(users)) => users.find_user(user_id).await?,
            _ => None,
        };
        Ok(IntrospectionResponse::active(token, user.as_ref(), refresh))
    }

    // -------------------------------------------------------------------------
    // Error rendering
    // -------------------------------------------------------------------------

    /// Renders an error as a response.
    ///
    /// Errors carrying a redirect target are appended to the client's
    /// redirect URI. With `redirect_error_uris` enabled, errors with an
    /// `error_uri` redirect to that page. Everything else is an inline JSON
    /// body with the code's HTTP status.
    #[must_use]
    pub fn handle_error(&self, err: OAuth2Error) -> OAuth2Response {
        let err = self.decorate(err);
        if err.is_client_error() {
            tracing::debug!(error = %err.code, description = ?err.description, "OAuth2 error");
        } else {
            tracing::error!(error = %err.code, description = ?err.description, "OAuth2 server error");
        }

        if let Some(redirect) = &err.redirect {
            match add_params_to_uri(&redirect.uri, err.get_body(), redirect.mode) {
                Ok(location) => return OAuth2Response::redirect(location),
                Err(e) => {
                    tracing::error!(error = %e, "Cannot build error redirect");
                    return self.inline_error(&OAuth2Error::server_error("Invalid redirect URI"));
                }
            }
        }

        if self.ctx.config.redirect_error_uris
            && let Some(uri) = &err.uri
        {
            let params = err
                .get_body()
                .into_iter()
                .filter(|(key, _)| *key != "error_uri");
            if let Ok(location) = add_params_to_uri(uri, params, ResponseMode::Query) {
                return OAuth2Response::redirect(location);
            }
        }

        self.inline_error(&err)
    }

    fn inline_error(&self, err: &OAuth2Error) -> OAuth2Response {
        let mut response = OAuth2Response::json(err.status_code(), err.to_json());
        response.headers = err
            .get_headers()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        response
    }

    /// Renders an error for the hosting application's consent page: the
    /// decorated error body, form-urlencoded.
    #[must_use]
    pub fn error_body(&self, err: OAuth2Error) -> String {
        self.decorate(err).to_urlencoded()
    }
}
