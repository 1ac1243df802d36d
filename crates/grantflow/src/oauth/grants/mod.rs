//! Grant handlers.
//!
//! Each grant type is a separate handler registered with the
//! [`AuthorizationServer`](crate::AuthorizationServer):
//!
//! - [`AuthorizationGrant`] handlers serve the authorization endpoint and are
//!   keyed by `response_type`
//! - [`TokenGrant`] handlers serve the token endpoint and are keyed by
//!   `grant_type`
//!
//! Every handler follows the same sequence: authenticate the client, validate
//! the request, then issue. Any failure short-circuits and nothing is issued.

pub mod authorization_code;
pub mod client_credentials;
pub mod device_code;
pub mod implicit;
pub mod jwt_bearer;
pub mod password;
pub mod refresh_token;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::config::ServerConfig;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::oauth::client_auth::{self, AuthenticatedClient};
use crate::oauth::consent::Grant;
use crate::oauth::generator::BearerTokenGenerator;
use crate::oauth::request::OAuth2Request;
use crate::oauth::response::OAuth2Response;
use crate::oauth::scope::Scope;
use crate::storage::{AuthorizationCodeStore, ClientStore, DeviceStore, TokenStore, UserStore};
use crate::types::{
    Client, GrantType, ResponseMode, ResponseType, Token, TokenEndpointAuthMethod, User,
};

pub use authorization_code::AuthorizationCodeGrant;
pub use client_credentials::ClientCredentialsGrant;
pub use device_code::DeviceCodeGrant;
pub use implicit::ImplicitGrant;
pub use jwt_bearer::JwtBearerGrant;
pub use password::PasswordGrant;
pub use refresh_token::RefreshTokenGrant;

// =============================================================================
// Grant Context
// =============================================================================

/// Everything a grant handler needs: configuration, stores and the token
/// generator. Shared read-only across concurrent requests.
#[derive(Clone)]
pub struct GrantContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Registered clients.
    pub clients: Arc<dyn ClientStore>,
    /// Issued tokens.
    pub tokens: Arc<dyn TokenStore>,
    /// Authorization codes, required by the authorization code grant.
    pub codes: Option<Arc<dyn AuthorizationCodeStore>>,
    /// End users, required by the password and jwt-bearer grants.
    pub users: Option<Arc<dyn UserStore>>,
    /// Device authorizations, required by the device code grant.
    pub devices: Option<Arc<dyn DeviceStore>>,
    /// Token generator.
    pub generator: BearerTokenGenerator,
}

impl std::fmt::Debug for GrantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantContext")
            .field("config", &self.config)
            .field("generator", &self.generator)
            .finish_non_exhaustive()
    }
}

fn missing_store(name: &str) -> OAuth2Error {
    tracing::error!(store = name, "Grant requires a store that is not configured");
    OAuth2Error::server_error("The server is not configured for this grant")
}

impl GrantContext {
    /// The authorization code store.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if no code store is configured.
    pub fn codes(&self) -> OAuth2Result<&dyn AuthorizationCodeStore> {
        self.codes.as_deref().ok_or_else(|| missing_store("codes"))
    }

    /// The user store.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if no user store is configured.
    pub fn users(&self) -> OAuth2Result<&dyn UserStore> {
        self.users.as_deref().ok_or_else(|| missing_store("users"))
    }

    /// The device store.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if no device store is configured.
    pub fn devices(&self) -> OAuth2Result<&dyn DeviceStore> {
        self.devices.as_deref().ok_or_else(|| missing_store("devices"))
    }

    /// Authenticates the requesting client with one of `allowed`.
    ///
    /// # Errors
    ///
    /// See [`client_auth::authenticate_client`].
    pub async fn authenticate_client(
        &self,
        request: &OAuth2Request,
        allowed: &[TokenEndpointAuthMethod],
    ) -> OAuth2Result<AuthenticatedClient> {
        client_auth::authenticate_client(request, self.clients.as_ref(), &self.config, allowed)
            .await
    }

    /// Checks a requested scope against the server's supported scopes.
    ///
    /// # Errors
    ///
    /// Returns `invalid_scope` if any token is not supported.
    pub fn validate_requested_scope(&self, scope: &Scope) -> OAuth2Result<()> {
        let Some(supported) = &self.config.scopes_supported else {
            return Ok(());
        };
        let supported: Scope = supported.iter().map(String::as_str).collect();
        let unsupported = scope.difference(&supported);
        if unsupported.is_empty() {
            Ok(())
        } else {
            Err(OAuth2Error::invalid_scope(format!(
                "Unsupported scope: {unsupported}"
            )))
        }
    }

    /// Generates a token and saves it.
    ///
    /// # Errors
    ///
    /// Returns a storage-derived error if the token cannot be saved.
    pub async fn issue_token(
        &self,
        client: &Client,
        grant_type: GrantType,
        user: Option<&User>,
        scope: &Scope,
        include_refresh_token: bool,
    ) -> OAuth2Result<Token> {
        let token = self
            .generator
            .generate(client, grant_type, user, scope, include_refresh_token);
        self.tokens.save_token(&token).await?;
        tracing::info!(
            client_id = %client.client_id,
            grant_type = %grant_type,
            user_id = user.map(User::user_id),
            scope = %token.scope,
            refresh = token.refresh_token.is_some(),
            "Token issued"
        );
        Ok(token)
    }

    // -------------------------------------------------------------------------
    // Authorization endpoint helpers
    // -------------------------------------------------------------------------

    /// Looks up the client named by `client_id` at the authorization endpoint.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` if the parameter is missing or the client is
    /// unknown or inactive.
    pub async fn query_authorization_client(&self, request: &OAuth2Request) -> OAuth2Result<Client> {
        let state = request.state();
        let client_id = request.client_id().ok_or_else(|| {
            OAuth2Error::invalid_client("Missing \"client_id\" in request").with_state(state)
        })?;

        match self.clients.get_client(client_id).await? {
            Some(client) if client.active => Ok(client),
            _ => {
                tracing::warn!(client_id = %client_id, "Unknown or inactive client at authorization endpoint");
                Err(OAuth2Error::invalid_client("Invalid client").with_state(state))
            }
        }
    }

    /// Resolves the redirect URI of an authorization request.
    ///
    /// A missing `redirect_uri` falls back to the client's only registered
    /// URI. Errors are never redirected since the URI is not yet trusted.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` if the URI is missing and cannot be defaulted,
    /// or does not match a registered URI.
    pub fn resolve_redirect_uri(&self, client: &Client, request: &OAuth2Request) -> OAuth2Result<String> {
        let state = request.state();
        match request.redirect_uri() {
            Some(uri) if client.check_redirect_uri(uri) => Ok(uri.to_string()),
            Some(_) => Err(
                OAuth2Error::invalid_request("Redirect URI is not supported by client")
                    .with_state(state),
            ),
            None => client.default_redirect_uri().map(str::to_owned).ok_or_else(|| {
                OAuth2Error::invalid_request("Missing \"redirect_uri\" in request")
                    .with_state(state)
            }),
        }
    }

    /// Resolves the response mode of an authorization request.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for unknown modes and modes not in `allowed`.
    pub fn resolve_response_mode(
        &self,
        request: &OAuth2Request,
        default: ResponseMode,
        allowed: &[ResponseMode],
    ) -> OAuth2Result<ResponseMode> {
        let Some(value) = request.response_mode() else {
            return Ok(default);
        };
        match ResponseMode::parse(value) {
            Some(mode) if allowed.contains(&mode) => Ok(mode),
            _ => Err(OAuth2Error::invalid_request(format!(
                "Unsupported \"response_mode\": {value}"
            ))),
        }
    }
}

// =============================================================================
// Grant Traits
// =============================================================================

/// A grant served at the authorization endpoint.
#[async_trait]
pub trait AuthorizationGrant: Send + Sync {
    /// The `response_type` this grant handles.
    fn response_type(&self) -> ResponseType;

    /// Validates an authorization request.
    ///
    /// Errors raised once the redirect URI is trusted carry a redirect target.
    async fn validate_authorization_request(
        &self,
        ctx: &GrantContext,
        request: &OAuth2Request,
    ) -> OAuth2Result<Grant>;

    /// Issues the code or token for an approved request and builds the
    /// redirect response.
    async fn create_authorization_response(
        &self,
        ctx: &GrantContext,
        grant: &Grant,
        user: &User,
    ) -> OAuth2Result<OAuth2Response>;
}

/// Credential consumed by a successful token request.
#[derive(Debug, Clone, Default)]
pub enum PreviousCredential {
    /// Nothing to retire.
    #[default]
    None,
    /// A refresh token record that may be rotated.
    RefreshToken(Box<Token>),
    /// An approved device code that must be removed.
    DeviceCode(String),
}

/// A token request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedTokenRequest {
    /// The authenticated client.
    pub client: Client,
    /// The grant type being exchanged.
    pub grant_type: GrantType,
    /// The resource owner, if any.
    pub user: Option<User>,
    /// Scope to issue.
    pub scope: Scope,
    /// Whether a refresh token is issued.
    pub include_refresh_token: bool,
    /// Credential retired on issuance.
    pub previous: PreviousCredential,
}

/// A grant served at the token endpoint.
#[async_trait]
pub trait TokenGrant: Send + Sync {
    /// The `grant_type` this grant handles.
    fn grant_type(&self) -> GrantType;

    /// Client authentication methods accepted for this grant.
    fn auth_methods(&self) -> &[TokenEndpointAuthMethod];

    /// Authenticates the client and validates the request.
    async fn validate_token_request(
        &self,
        ctx: &GrantContext,
        request: &OAuth2Request,
    ) -> OAuth2Result<ValidatedTokenRequest>;

    /// Issues and persists the token, returning the JSON token response.
    async fn create_token_response(
        &self,
        ctx: &GrantContext,
        validated: ValidatedTokenRequest,
    ) -> OAuth2Result<OAuth2Response> {
        let token = ctx
            .issue_token(
                &validated.client,
                validated.grant_type,
                validated.user.as_ref(),
                &validated.scope,
                validated.include_refresh_token,
            )
            .await?;
        Ok(token_json_response(&token))
    }
}

/// Renders a token as a `200` JSON response.
#[must_use]
pub fn token_json_response(token: &Token) -> OAuth2Response {
    let body = serde_json::to_value(token.to_response()).unwrap_or_default();
    OAuth2Response::json(StatusCode::OK, body)
}

/// Checks that the authenticated client may use `grant_type`.
///
/// # Errors
///
/// Returns `unauthorized_client` otherwise.
pub fn check_client_grant_type(client: &Client, grant_type: GrantType) -> OAuth2Result<()> {
    if client.check_grant_type(grant_type) {
        Ok(())
    } else {
        tracing::warn!(client_id = %client.client_id, grant_type = %grant_type, "Grant type not allowed for client");
        Err(OAuth2Error::unauthorized_client(format!(
            "The client is not authorized to use \"grant_type={grant_type}\""
        )))
    }
}

#[cfg(test)]
pub(crate) mod test_support;
