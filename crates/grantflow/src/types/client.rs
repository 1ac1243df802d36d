//! Registered OAuth 2.0 client types.

use std::fmt;
use std::time::Duration;

use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::oauth::scope::Scope;

// ============================================================================
// Grant Types
// ============================================================================

/// OAuth 2.0 grant types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantType {
    /// Authorization code grant (RFC 6749 Section 4.1).
    #[serde(rename = "authorization_code")]
    AuthorizationCode,

    /// Implicit grant (RFC 6749 Section 4.2).
    #[serde(rename = "implicit")]
    Implicit,

    /// Client credentials grant (RFC 6749 Section 4.4).
    #[serde(rename = "client_credentials")]
    ClientCredentials,

    /// Resource owner password credentials grant (RFC 6749 Section 4.3).
    #[serde(rename = "password")]
    Password,

    /// Refresh token grant (RFC 6749 Section 6).
    #[serde(rename = "refresh_token")]
    RefreshToken,

    /// Device authorization grant (RFC 8628).
    #[serde(rename = "urn:ietf:params:oauth:grant-type:device_code")]
    DeviceCode,

    /// JWT bearer assertion grant (RFC 7523).
    #[serde(rename = "urn:ietf:params:oauth:grant-type:jwt-bearer")]
    JwtBearer,
}

impl GrantType {
    /// Returns the grant type as its wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Implicit => "implicit",
            Self::ClientCredentials => "client_credentials",
            Self::Password => "password",
            Self::RefreshToken => "refresh_token",
            Self::DeviceCode => "urn:ietf:params:oauth:grant-type:device_code",
            Self::JwtBearer => "urn:ietf:params:oauth:grant-type:jwt-bearer",
        }
    }

    /// Parses a wire grant type.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let parsed = match value {
            "authorization_code" => Self::AuthorizationCode,
            "implicit" => Self::Implicit,
            "client_credentials" => Self::ClientCredentials,
            "password" => Self::Password,
            "refresh_token" => Self::RefreshToken,
            "urn:ietf:params:oauth:grant-type:device_code" => Self::DeviceCode,
            "urn:ietf:params:oauth:grant-type:jwt-bearer" => Self::JwtBearer,
            _ => return None,
        };
        Some(parsed)
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Response Types and Modes
// ============================================================================

/// Authorization endpoint response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Authorization code.
    Code,
    /// Access token delivered directly (implicit grant).
    Token,
}

impl ResponseType {
    /// Returns the response type as its wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Token => "token",
        }
    }

    /// Parses a wire response type.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "code" => Some(Self::Code),
            "token" => Some(Self::Token),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How authorization response parameters are attached to the redirect URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Parameters are appended to the query component.
    Query,
    /// Parameters are placed in the fragment component.
    Fragment,
}

impl ResponseMode {
    /// Returns the response mode as its wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Fragment => "fragment",
        }
    }

    /// Parses a wire response mode.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "query" => Some(Self::Query),
            "fragment" => Some(Self::Fragment),
            _ => None,
        }
    }
}

// ============================================================================
// Token Endpoint Auth Methods
// ============================================================================

/// Client authentication methods at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// Public client, no authentication.
    None,
    /// HTTP Basic authentication with client_id and client_secret.
    #[default]
    ClientSecretBasic,
    /// client_id and client_secret in the request body.
    ClientSecretPost,
    /// JWT assertion signed with the client secret (HMAC).
    ClientSecretJwt,
    /// JWT assertion signed with the client's private key.
    PrivateKeyJwt,
}

impl TokenEndpointAuthMethod {
    /// Returns the method as its wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::ClientSecretJwt => "client_secret_jwt",
            Self::PrivateKeyJwt => "private_key_jwt",
        }
    }
}

impl fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Client
// ============================================================================

/// A registered OAuth 2.0 client.
///
/// Clients are owned by the [`ClientStore`](crate::storage::ClientStore) and
/// are treated as immutable while a request is processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier.
    pub client_id: String,

    /// Client secret. `None` for public clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Registered redirect URIs.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Response types the client may request at the authorization endpoint.
    #[serde(default)]
    pub response_types: Vec<ResponseType>,

    /// Grant types the client may use.
    #[serde(default)]
    pub grant_types: Vec<GrantType>,

    /// Space-delimited scopes the client may be granted.
    #[serde(default)]
    pub scope: String,

    /// How the client authenticates at the token endpoint.
    #[serde(default)]
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,

    /// Whether the client is active.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Access token lifetime override for this client.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub access_token_lifetime: Option<Duration>,

    /// Public keys used to verify `private_key_jwt` and jwt-bearer assertions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JwkSet>,
}

fn default_active() -> bool {
    true
}

/// Client metadata validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientValidationError {
    /// The client_id is empty.
    #[error("client_id cannot be empty")]
    EmptyClientId,

    /// A secret-based auth method is registered without a secret.
    #[error("token_endpoint_auth_method {0} requires a client_secret")]
    MissingSecret(TokenEndpointAuthMethod),

    /// `private_key_jwt` is registered without a key set.
    #[error("private_key_jwt requires a jwks")]
    MissingJwks,

    /// A redirect-based grant is registered without redirect URIs.
    #[error("grant type {0} requires at least one redirect_uri")]
    MissingRedirectUri(GrantType),

    /// A redirect URI is not an absolute URI or carries a fragment.
    #[error("invalid redirect_uri: {0}")]
    InvalidRedirectUri(String),
}

impl Client {
    /// Creates a confidential client with `client_secret_basic` and no grants.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            client_name: None,
            redirect_uris: Vec::new(),
            response_types: Vec::new(),
            grant_types: Vec::new(),
            scope: String::new(),
            token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
            active: true,
            access_token_lifetime: None,
            jwks: None,
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Adds a redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    /// Replaces the allowed response types.
    #[must_use]
    pub fn with_response_types(mut self, types: impl IntoIterator<Item = ResponseType>) -> Self {
        self.response_types = types.into_iter().collect();
        self
    }

    /// Replaces the allowed grant types.
    #[must_use]
    pub fn with_grant_types(mut self, types: impl IntoIterator<Item = GrantType>) -> Self {
        self.grant_types = types.into_iter().collect();
        self
    }

    /// Sets the allowed scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Sets the token endpoint authentication method.
    #[must_use]
    pub fn with_auth_method(mut self, method: TokenEndpointAuthMethod) -> Self {
        self.token_endpoint_auth_method = method;
        self
    }

    /// Sets the JWK set used to verify this client's assertions.
    #[must_use]
    pub fn with_jwks(mut self, jwks: JwkSet) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Validates the client metadata.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found in the registration.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        match self.token_endpoint_auth_method {
            method @ (TokenEndpointAuthMethod::ClientSecretBasic
            | TokenEndpointAuthMethod::ClientSecretPost
            | TokenEndpointAuthMethod::ClientSecretJwt) => {
                if self.client_secret.as_deref().is_none_or(str::is_empty) {
                    return Err(ClientValidationError::MissingSecret(method));
                }
            }
            TokenEndpointAuthMethod::PrivateKeyJwt => {
                if self.jwks.as_ref().is_none_or(|set| set.keys.is_empty()) {
                    return Err(ClientValidationError::MissingJwks);
                }
            }
            TokenEndpointAuthMethod::None => {}
        }

        for grant in [GrantType::AuthorizationCode, GrantType::Implicit] {
            if self.check_grant_type(grant) && self.redirect_uris.is_empty() {
                return Err(ClientValidationError::MissingRedirectUri(grant));
            }
        }

        for uri in &self.redirect_uris {
            match url::Url::parse(uri) {
                Ok(parsed) if parsed.fragment().is_none() => {}
                _ => return Err(ClientValidationError::InvalidRedirectUri(uri.clone())),
            }
        }

        Ok(())
    }

    /// Returns `true` if the client cannot hold a secret.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.token_endpoint_auth_method == TokenEndpointAuthMethod::None
    }

    /// Checks whether a redirect URI exactly matches a registered one.
    #[must_use]
    pub fn check_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered == uri)
    }

    /// Returns the redirect URI to use when the request omits one.
    ///
    /// Only defined when exactly one URI is registered.
    #[must_use]
    pub fn default_redirect_uri(&self) -> Option<&str> {
        match self.redirect_uris.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }

    /// Checks whether the client may request the response type.
    #[must_use]
    pub fn check_response_type(&self, response_type: ResponseType) -> bool {
        self.response_types.contains(&response_type)
    }

    /// Checks whether the client may use the grant type.
    #[must_use]
    pub fn check_grant_type(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Checks whether the client registered the given authentication method.
    #[must_use]
    pub fn check_endpoint_auth_method(&self, method: TokenEndpointAuthMethod) -> bool {
        self.token_endpoint_auth_method == method
    }

    /// Compares a presented secret against the registered one in constant time.
    #[must_use]
    pub fn check_client_secret(&self, presented: &str) -> bool {
        match self.client_secret.as_deref() {
            Some(secret) if !secret.is_empty() => {
                secret.as_bytes().ct_eq(presented.as_bytes()).into()
            }
            _ => false,
        }
    }

    /// Returns the scopes the client is registered for.
    #[must_use]
    pub fn registered_scope(&self) -> Scope {
        Scope::parse(&self.scope)
    }

    /// Narrows a requested scope to what the client is allowed.
    ///
    /// Keeps the requested order and drops anything not registered.
    #[must_use]
    pub fn allowed_scope(&self, requested: &Scope) -> Scope {
        requested.intersect(&self.registered_scope())
    }
}

// ============================================================================
// Tests
// ============================================================================
