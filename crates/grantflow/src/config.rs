//! Authorization server configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [oauth]
//! scopes_supported = ["profile", "email"]
//! allow_insecure_transport = true
//!
//! [oauth.error_uris]
//! invalid_client = "https://a.b/e#invalid_client"
//!
//! [oauth.tokens]
//! default_lifetime = "1h"
//! rotate_refresh_tokens = true
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::types::GrantType;

/// Root configuration of an [`AuthorizationServer`](crate::AuthorizationServer).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Scopes the server recognises. When set, every requested scope token
    /// must be a member or the request fails with `invalid_scope`.
    pub scopes_supported: Option<Vec<String>>,

    /// Accept plain-HTTP requests. Only for development and tests.
    pub allow_insecure_transport: bool,

    /// Per-error-code documentation URIs, reported as `error_uri`.
    pub error_uris: BTreeMap<String, String>,

    /// Render inline errors as a redirect to their registered error URI.
    pub redirect_error_uris: bool,

    /// Public token endpoint URL, the expected audience of JWT assertions.
    pub token_endpoint: Option<String>,

    /// Token issuance settings.
    pub tokens: TokenConfig,

    /// Authorization code settings.
    pub authorization_code: AuthorizationCodeConfig,

    /// PKCE policy.
    pub pkce: PkceConfig,

    /// Device authorization flow settings.
    pub device: DeviceConfig,

    /// JWT assertion validation settings.
    pub assertions: AssertionConfig,

    /// Report `prompt=login` from consent validation when no end user is known.
    pub prompt_login_without_user: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            scopes_supported: None,
            allow_insecure_transport: false,
            error_uris: BTreeMap::new(),
            redirect_error_uris: false,
            token_endpoint: None,
            tokens: TokenConfig::default(),
            authorization_code: AuthorizationCodeConfig::default(),
            pkce: PkceConfig::default(),
            device: DeviceConfig::default(),
            assertions: AssertionConfig::default(),
            prompt_login_without_user: false,
        }
    }
}

/// Token lifetimes and refresh policy.
///
/// Per-grant lifetimes default to 1 hour for the implicit grant and 10 days
/// for the other grants.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Lifetime used when no per-grant value applies.
    #[serde(with = "humantime_serde")]
    pub default_lifetime: Duration,

    /// Access token lifetime for the implicit grant.
    #[serde(with = "humantime_serde")]
    pub implicit_lifetime: Duration,

    /// Access token lifetime for the authorization code grant.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Access token lifetime for the password grant.
    #[serde(with = "humantime_serde")]
    pub password_lifetime: Duration,

    /// Access token lifetime for the client credentials grant.
    #[serde(with = "humantime_serde")]
    pub client_credentials_lifetime: Duration,

    /// Lifetime of refresh tokens.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Issue a new refresh token on every refresh and revoke the old one.
    pub rotate_refresh_tokens: bool,

    /// Length of generated access and refresh tokens.
    pub token_length: usize,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            default_lifetime: Duration::from_secs(3600),
            implicit_lifetime: Duration::from_secs(3600),
            authorization_code_lifetime: Duration::from_secs(864_000),
            password_lifetime: Duration::from_secs(864_000),
            client_credentials_lifetime: Duration::from_secs(864_000),
            refresh_token_lifetime: Duration::from_secs(14 * 24 * 3600),
            rotate_refresh_tokens: true,
            token_length: 42,
        }
    }
}

impl TokenConfig {
    /// Access token lifetime for a grant type.
    #[must_use]
    pub fn lifetime_for(&self, grant_type: GrantType) -> Duration {
        match grant_type {
            GrantType::Implicit => self.implicit_lifetime,
            GrantType::AuthorizationCode => self.authorization_code_lifetime,
            GrantType::Password => self.password_lifetime,
            GrantType::ClientCredentials => self.client_credentials_lifetime,
            _ => self.default_lifetime,
        }
    }
}

/// Authorization code settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorizationCodeConfig {
    /// How long a code stays redeemable.
    #[serde(with = "humantime_serde")]
    pub lifetime: Duration,

    /// Length of generated codes.
    pub code_length: usize,
}

impl Default for AuthorizationCodeConfig {
    fn default() -> Self {
        Self {
            lifetime: Duration::from_secs(600),
            code_length: 48,
        }
    }
}

/// PKCE policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PkceConfig {
    /// Public clients must send a `code_challenge`.
    pub require_for_public_clients: bool,

    /// Accept `code_challenge_method=plain`.
    pub allow_plain: bool,
}

impl Default for PkceConfig {
    fn default() -> Self {
        Self {
            require_for_public_clients: true,
            allow_plain: false,
        }
    }
}

/// Device authorization flow settings (RFC 8628).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Where the user enters the user code.
    pub verification_uri: String,

    /// How long the device code stays valid.
    #[serde(with = "humantime_serde")]
    pub lifetime: Duration,

    /// Minimum polling interval.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Number of characters in a user code, excluding the separator.
    pub user_code_length: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            verification_uri: "http://localhost/device".to_string(),
            lifetime: Duration::from_secs(1800),
            interval: Duration::from_secs(5),
            user_code_length: 8,
        }
    }
}

/// JWT assertion validation (client assertions and the jwt-bearer grant).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssertionConfig {
    /// Maximum distance between now and an assertion's `exp`.
    #[serde(with = "humantime_serde")]
    pub max_lifetime: Duration,

    /// Clock skew tolerance.
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl Default for AssertionConfig {
    fn default() -> Self {
        Self {
            max_lifetime: Duration::from_secs(300),
            leeway: Duration::from_secs(60),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl ServerConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - An `error_uris` key is not a known error code
    /// - A lifetime or length is zero
    /// - `scopes_supported` contains an empty or whitespace-bearing entry
    /// - The device verification URI or token endpoint is not an absolute URI
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (code, uri) in &self.error_uris {
            if ErrorCode::parse(code).is_none() {
                return Err(ConfigError::InvalidValue(format!(
                    "error_uris: unknown error code '{code}'"
                )));
            }
            if uri.is_empty() {
                return Err(ConfigError::InvalidValue(format!(
                    "error_uris: empty uri for '{code}'"
                )));
            }
        }

        if let Some(scopes) = &self.scopes_supported
            && scopes
                .iter()
                .any(|s| s.is_empty() || s.contains(char::is_whitespace))
        {
            return Err(ConfigError::InvalidValue(
                "scopes_supported entries must be single non-empty tokens".to_string(),
            ));
        }

        let lifetimes = [
            ("tokens.default_lifetime", self.tokens.default_lifetime),
            ("tokens.implicit_lifetime", self.tokens.implicit_lifetime),
            (
                "tokens.authorization_code_lifetime",
                self.tokens.authorization_code_lifetime,
            ),
            ("tokens.password_lifetime", self.tokens.password_lifetime),
            (
                "tokens.client_credentials_lifetime",
                self.tokens.client_credentials_lifetime,
            ),
            ("tokens.refresh_token_lifetime", self.tokens.refresh_token_lifetime),
            ("authorization_code.lifetime", self.authorization_code.lifetime),
            ("device.lifetime", self.device.lifetime),
            ("assertions.max_lifetime", self.assertions.max_lifetime),
        ];
        for (name, value) in lifetimes {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
        }

        if self.tokens.token_length < 20 || self.authorization_code.code_length < 20 {
            return Err(ConfigError::InvalidValue(
                "token_length and code_length must be >= 20".to_string(),
            ));
        }
        if self.device.user_code_length < 6 {
            return Err(ConfigError::InvalidValue(
                "device.user_code_length must be >= 6".to_string(),
            ));
        }

        if url::Url::parse(&self.device.verification_uri).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "device.verification_uri is not an absolute URI: '{}'",
                self.device.verification_uri
            )));
        }
        if let Some(endpoint) = &self.token_endpoint
            && url::Url::parse(endpoint).is_err()
        {
            return Err(ConfigError::InvalidValue(format!(
                "token_endpoint is not an absolute URI: '{endpoint}'"
            )));
        }

        Ok(())
    }

    /// Returns the configured error URI for a code.
    #[must_use]
    pub fn error_uri(&self, code: ErrorCode) -> Option<&str> {
        self.error_uris.get(code.as_str()).map(String::as_str)
    }

    /// Adds a per-error-code URI.
    #[must_use]
    pub fn with_error_uri(mut self, code: ErrorCode, uri: impl Into<String>) -> Self {
        self.error_uris.insert(code.as_str().to_string(), uri.into());
        self
    }

    /// Restricts requests to the given scopes.
    #[must_use]
    pub fn with_scopes_supported<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes_supported = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Allows plain-HTTP requests.
    #[must_use]
    pub fn with_insecure_transport(mut self, allow: bool) -> Self {
        self.allow_insecure_transport = allow;
        self
    }

    /// Sets the token endpoint URL.
    #[must_use]
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.allow_insecure_transport);
        assert!(config.tokens.rotate_refresh_tokens);
        assert_eq!(config.authorization_code.lifetime, Duration::from_secs(600));
    }

    #[test]
    fn test_grant_lifetimes() {
        let tokens = TokenConfig::default();
        assert_eq!(tokens.lifetime_for(GrantType::Implicit), Duration::from_secs(3600));
        assert_eq!(
            tokens.lifetime_for(GrantType::AuthorizationCode),
            Duration::from_secs(864_000)
        );
        assert_eq!(tokens.lifetime_for(GrantType::RefreshToken), Duration::from_secs(3600));
    }

    #[test]
    fn test_unknown_error_uri_code_rejected() {
        let mut config = ServerConfig::default();
        config
            .error_uris
            .insert("not_a_code".to_string(), "https://a.b/e".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("not_a_code"));
    }

    #[test]
    fn test_error_uri_lookup() {
        let config = ServerConfig::default()
            .with_error_uri(ErrorCode::InvalidClient, "https://a.b/e#invalid_client");
        assert!(config.validate().is_ok());
        assert_eq!(
            config.error_uri(ErrorCode::InvalidClient),
            Some("https://a.b/e#invalid_client")
        );
        assert_eq!(config.error_uri(ErrorCode::InvalidGrant), None);
    }

    #[test]
    fn test_scope_entries_validated() {
        let config = ServerConfig::default().with_scopes_supported(["profile email"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_lifetime_rejected() {
        let mut config = ServerConfig::default();
        config.device.lifetime = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("device.lifetime"));
    }

    #[test]
    fn test_deserialize_humantime() {
        let config: ServerConfig = serde_json::from_value(serde_json::json!({
            "scopes_supported": ["profile"],
            "tokens": { "implicit_lifetime": "30m", "rotate_refresh_tokens": false },
            "error_uris": { "invalid_client": "https://a.b/e#invalid_client" }
        }))
        .unwrap();
        assert_eq!(config.tokens.implicit_lifetime, Duration::from_secs(1800));
        assert!(!config.tokens.rotate_refresh_tokens);
        assert_eq!(config.tokens.default_lifetime, Duration::from_secs(3600));
        assert_eq!(config.scopes_supported, Some(vec!["profile".to_string()]));
    }
}
