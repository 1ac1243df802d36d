//! Client authentication at the token, revocation, introspection and
//! device authorization endpoints.
//!
//! Supports the following methods:
//!
//! - `client_secret_basic` - HTTP Basic authentication
//! - `client_secret_post` - credentials in the request body
//! - `client_secret_jwt` - JWT assertion signed with the client secret
//! - `private_key_jwt` - JWT assertion signed with the client's private key
//! - `none` - public clients presenting only their client_id
//!
//! The method is detected from what the request carries. It must then be
//! both accepted by the endpoint and the one the client registered.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::config::ServerConfig;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::oauth::assertion::{self, CLIENT_ASSERTION_TYPE};
use crate::oauth::request::OAuth2Request;
use crate::storage::ClientStore;
use crate::types::{Client, TokenEndpointAuthMethod};

/// A client whose credentials were verified.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    /// The client record.
    pub client: Client,

    /// How the client authenticated.
    pub method: TokenEndpointAuthMethod,
}

/// Credentials found in a request, before verification.
#[derive(Debug)]
enum Presented<'a> {
    Basic { client_id: String, secret: String },
    Post { client_id: &'a str, secret: &'a str },
    Assertion { client_id: String, assertion: &'a str, method: TokenEndpointAuthMethod },
    None { client_id: &'a str },
}

impl Presented<'_> {
    fn client_id(&self) -> &str {
        match self {
            Self::Basic { client_id, .. } | Self::Assertion { client_id, .. } => client_id.as_str(),
            Self::Post { client_id, .. } | Self::None { client_id } => *client_id,
        }
    }

    fn method(&self) -> TokenEndpointAuthMethod {
        match self {
            Self::Basic { .. } => TokenEndpointAuthMethod::ClientSecretBasic,
            Self::Post { .. } => TokenEndpointAuthMethod::ClientSecretPost,
            Self::Assertion { method, .. } => *method,
            Self::None { .. } => TokenEndpointAuthMethod::None,
        }
    }
}

/// Authenticates the client making a request.
///
/// # Arguments
///
/// * `request` - The incoming request
/// * `clients` - Client registry
/// * `config` - Server configuration (assertion audience and lifetimes)
/// * `allowed` - Methods accepted by the calling endpoint or grant
///
/// # Errors
///
/// Returns `invalid_client` if:
/// - No credentials are present
/// - The client doesn't exist or is inactive
/// - The method is not allowed here or not registered for the client
/// - The secret or assertion does not verify
///
/// Returns `invalid_request` if more than one authentication method is used.
pub async fn authenticate_client(
    request: &OAuth2Request,
    clients: &dyn ClientStore,
    config: &ServerConfig,
    allowed: &[TokenEndpointAuthMethod],
) -> OAuth2Result<AuthenticatedClient> {
    let presented = detect_credentials(request)?;
    let method = presented.method();
    let client_id = presented.client_id().to_owned();

    if !allowed.contains(&method) {
        tracing::warn!(client_id = %client_id, method = %method, "Authentication method not allowed");
        return Err(OAuth2Error::invalid_client(format!(
            "Authentication method '{method}' is not allowed"
        )));
    }

    let client = clients
        .get_client(&client_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!(client_id = %client_id, "Unknown client");
            OAuth2Error::invalid_client("Invalid client")
        })?;

    if !client.active {
        tracing::warn!(client_id = %client_id, "Inactive client");
        return Err(OAuth2Error::invalid_client("Invalid client"));
    }

    if !client.check_endpoint_auth_method(method) {
        tracing::warn!(
            client_id = %client_id,
            method = %method,
            registered = %client.token_endpoint_auth_method,
            "Client used an unregistered authentication method"
        );
        return Err(OAuth2Error::invalid_client(format!(
            "Client is not registered for '{method}'"
        )));
    }

    match presented {
        Presented::Basic { secret, .. } => verify_secret(&client, &secret)?,
        Presented::Post { secret, .. } => verify_secret(&client, secret)?,
        Presented::Assertion { assertion, .. } => {
            assertion::verify_assertion(
                assertion,
                &client,
                Some(&client.client_id),
                config.token_endpoint.as_deref(),
                &config.assertions,
            )
            .map_err(|e| {
                tracing::warn!(client_id = %client_id, error = %e, "Client assertion rejected");
                OAuth2Error::invalid_client(e.to_string())
            })?;
        }
        Presented::None { .. } => {}
    }

    tracing::debug!(client_id = %client_id, method = %method, "Client authenticated");
    Ok(AuthenticatedClient { client, method })
}

fn verify_secret(client: &Client, secret: &str) -> OAuth2Result<()> {
    if client.check_client_secret(secret) {
        Ok(())
    } else {
        tracing::warn!(client_id = %client.client_id, "Invalid client secret");
        Err(OAuth2Error::invalid_client("Invalid client credentials"))
    }
}

fn detect_credentials(request: &OAuth2Request) -> OAuth2Result<Presented<'_>> {
    let body_client_id = request.client_id();
    let body_secret = request.client_secret();

    if let Some(header) = request.authorization()
        && header.trim_start().starts_with("Basic ")
    {
        let (client_id, secret) = parse_basic_auth(header)?;
        if body_secret.is_some() || request.client_assertion().is_some() {
            return Err(OAuth2Error::invalid_request(
                "Multiple client authentication methods used",
            ));
        }
        if body_client_id.is_some_and(|id| id != client_id) {
            return Err(OAuth2Error::invalid_client(
                "client_id does not match the Authorization header",
            ));
        }
        return Ok(Presented::Basic { client_id, secret });
    }

    if let Some(assertion_value) = request.client_assertion() {
        if body_secret.is_some() {
            return Err(OAuth2Error::invalid_request(
                "Multiple client authentication methods used",
            ));
        }
        if request.client_assertion_type() != Some(CLIENT_ASSERTION_TYPE) {
            return Err(OAuth2Error::invalid_client(format!(
                "client_assertion_type must be '{CLIENT_ASSERTION_TYPE}'"
            )));
        }
        let method = assertion::assertion_auth_method(assertion_value)
            .map_err(|e| OAuth2Error::invalid_client(e.to_string()))?;
        let client_id = match body_client_id {
            Some(id) => id.to_owned(),
            None => assertion::peek_issuer(assertion_value).ok_or_else(|| {
                OAuth2Error::invalid_client("Client assertion has no issuer")
            })?,
        };
        return Ok(Presented::Assertion {
            client_id,
            assertion: assertion_value,
            method,
        });
    }

    match (body_client_id, body_secret) {
        (Some(client_id), Some(secret)) => Ok(Presented::Post { client_id, secret }),
        (Some(client_id), None) => Ok(Presented::None { client_id }),
        (None, _) => Err(OAuth2Error::invalid_client(
            "Client authentication required",
        )),
    }
}

/// Parse HTTP Basic authentication header.
///
/// Both parts are taken verbatim after base64 decoding.
///
/// # Errors
///
/// Returns `invalid_client` if the header is malformed.
pub fn parse_basic_auth(header: &str) -> OAuth2Result<(String, String)> {
    let header = header.trim();

    let encoded = header
        .strip_prefix("Basic ")
        .ok_or_else(|| OAuth2Error::invalid_client("Invalid Authorization header format"))?;

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| OAuth2Error::invalid_client("Invalid Base64 encoding"))?;

    let decoded_str = String::from_utf8(decoded)
        .map_err(|_| OAuth2Error::invalid_client("Invalid UTF-8 in credentials"))?;

    let (client_id, client_secret) = decoded_str
        .split_once(':')
        .ok_or_else(|| OAuth2Error::invalid_client("Invalid credentials format"))?;

    if client_id.is_empty() {
        return Err(OAuth2Error::invalid_client("Empty client_id"));
    }

    Ok((client_id.to_string(), client_secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, StorageError};
    use crate::oauth::assertion::tests::sign_hs256;
    use async_trait::async_trait;
    use axum::http::Method;
    use std::collections::HashMap;

    struct Clients(HashMap<String, Client>);

    #[async_trait]
    impl ClientStore for Clients {
        async fn get_client(&self, client_id: &str) -> Result<Option<Client>, StorageError> {
            Ok(self.0.get(client_id).cloned())
        }
    }

    fn store() -> Clients {
        let clients = [
            Client::new("basic").with_secret("basic-secret"),
            Client::new("post")
                .with_secret("post-secret")
                .with_auth_method(TokenEndpointAuthMethod::ClientSecretPost),
            Client::new("public").with_auth_method(TokenEndpointAuthMethod::None),
            Client::new("jwt")
                .with_secret("jwt-shared-secret-of-decent-length")
                .with_auth_method(TokenEndpointAuthMethod::ClientSecretJwt),
        ];
        Clients(
            clients
                .into_iter()
                .map(|c| (c.client_id.clone(), c))
                .collect(),
        )
    }

    const ALL: &[TokenEndpointAuthMethod] = &[
        TokenEndpointAuthMethod::ClientSecretBasic,
        TokenEndpointAuthMethod::ClientSecretPost,
        TokenEndpointAuthMethod::ClientSecretJwt,
        TokenEndpointAuthMethod::PrivateKeyJwt,
        TokenEndpointAuthMethod::None,
    ];

    fn basic(id: &str, secret: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
    }

    fn request() -> OAuth2Request {
        OAuth2Request::new(Method::POST, "https://auth.example.com/oauth/token")
    }

    async fn authenticate(
        request: &OAuth2Request,
        allowed: &[TokenEndpointAuthMethod],
    ) -> OAuth2Result<AuthenticatedClient> {
        authenticate_client(request, &store(), &ServerConfig::default(), allowed).await
    }

    #[tokio::test]
    async fn test_basic_auth() {
        let req = request().with_authorization(basic("basic", "basic-secret"));
        let auth = authenticate(&req, ALL).await.unwrap();
        assert_eq!(auth.client.client_id, "basic");
        assert_eq!(auth.method, TokenEndpointAuthMethod::ClientSecretBasic);

        let req = request().with_authorization(basic("basic", "wrong"));
        let err = authenticate(&req, ALL).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidClient);
    }

    #[tokio::test]
    async fn test_post_auth() {
        let req = request().with_params([("client_id", "post"), ("client_secret", "post-secret")]);
        let auth = authenticate(&req, ALL).await.unwrap();
        assert_eq!(auth.method, TokenEndpointAuthMethod::ClientSecretPost);
    }

    #[tokio::test]
    async fn test_registered_method_enforced() {
        // "basic" is registered for client_secret_basic only
        let req = request().with_params([("client_id", "basic"), ("client_secret", "basic-secret")]);
        let err = authenticate(&req, ALL).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidClient);
    }

    #[tokio::test]
    async fn test_public_client() {
        let req = request().with_param("client_id", "public");
        let auth = authenticate(&req, ALL).await.unwrap();
        assert_eq!(auth.method, TokenEndpointAuthMethod::None);

        let err = authenticate(&req, &[TokenEndpointAuthMethod::ClientSecretBasic])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidClient);
    }

    #[tokio::test]
    async fn test_confidential_client_cannot_skip_secret() {
        let req = request().with_param("client_id", "basic");
        let err = authenticate(&req, ALL).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidClient);
    }

    #[tokio::test]
    async fn test_unknown_and_missing_client() {
        let req = request().with_param("client_id", "nobody");
        assert_eq!(
            authenticate(&req, ALL).await.unwrap_err().code,
            ErrorCode::InvalidClient
        );
        assert_eq!(
            authenticate(&request(), ALL).await.unwrap_err().code,
            ErrorCode::InvalidClient
        );
    }

    #[tokio::test]
    async fn test_multiple_methods_rejected() {
        let req = request()
            .with_authorization(basic("basic", "basic-secret"))
            .with_param("client_secret", "basic-secret");
        let err = authenticate(&req, ALL).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn test_client_secret_jwt() {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let assertion = sign_hs256(
            "jwt-shared-secret-of-decent-length",
            &serde_json::json!({ "iss": "jwt", "sub": "jwt", "exp": now + 60, "jti": "a" }),
        );
        let req = request().with_params([
            ("client_assertion", assertion.as_str()),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
        ]);
        let auth = authenticate(&req, ALL).await.unwrap();
        assert_eq!(auth.client.client_id, "jwt");
        assert_eq!(auth.method, TokenEndpointAuthMethod::ClientSecretJwt);

        let req = request().with_params([
            ("client_assertion", assertion.as_str()),
            ("client_assertion_type", "urn:example:other"),
        ]);
        assert_eq!(
            authenticate(&req, ALL).await.unwrap_err().code,
            ErrorCode::InvalidClient
        );
    }

    #[test]
    fn test_parse_basic_auth() {
        let (id, secret) = parse_basic_auth(&basic("client", "pa:ss")).unwrap();
        assert_eq!(id, "client");
        assert_eq!(secret, "pa:ss");

        assert!(parse_basic_auth("Bearer abc").is_err());
        assert!(parse_basic_auth("Basic !!!").is_err());
        assert!(parse_basic_auth(&format!("Basic {}", STANDARD.encode("nocolon"))).is_err());
        assert!(parse_basic_auth(&basic("", "secret")).is_err());
    }
}
