//! JWT assertion verification (RFC 7523).
//!
//! Used both for client authentication (`client_secret_jwt`,
//! `private_key_jwt`) and for the jwt-bearer authorization grant.
//!
//! # Key Selection
//!
//! - `HS256`/`HS384`/`HS512` assertions are verified with the client secret
//! - All other algorithms are verified against the client's registered JWK
//!   set, narrowed by the `kid` header when present

use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::AssertionConfig;
use crate::types::{Client, TokenEndpointAuthMethod};

/// `client_assertion_type` value for JWT client assertions.
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Claims carried by a JWT assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuer, the client_id.
    pub iss: String,

    /// Subject. The client_id for client assertions, the user for the
    /// jwt-bearer grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience. Can be a single string or an array of strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<StringOrArray>,

    /// Expiration time as Unix timestamp.
    pub exp: i64,

    /// JWT ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Issued at time as Unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Audience claim can be a single string or an array of strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrArray {
    /// Single string audience.
    String(String),
    /// Array of audience strings.
    Array(Vec<String>),
}

impl StringOrArray {
    /// Checks if the audience contains the specified value.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::String(s) => s == value,
            Self::Array(arr) => arr.iter().any(|s| s == value),
        }
    }
}

/// Assertion verification failures.
#[derive(Debug, thiserror::Error)]
pub enum AssertionError {
    /// The assertion is not a well-formed JWT.
    #[error("Malformed assertion: {0}")]
    Malformed(String),

    /// The client has no key usable for the assertion's algorithm.
    #[error("No key available to verify the assertion")]
    NoKey,

    /// Signature or standard claim validation failed.
    #[error("Invalid assertion: {0}")]
    Invalid(String),

    /// `sub` does not match the expected value.
    #[error("Assertion subject must equal client_id")]
    SubjectMismatch,

    /// `exp` is too far in the future.
    #[error("Assertion exp must be within {0} seconds")]
    LifetimeTooLong(u64),
}

/// Returns `true` for HMAC algorithms.
#[must_use]
pub fn is_hmac(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Auth method implied by an assertion's signing algorithm.
///
/// # Errors
///
/// Returns `AssertionError::Malformed` if the header cannot be decoded.
pub fn assertion_auth_method(assertion: &str) -> Result<TokenEndpointAuthMethod, AssertionError> {
    let header = decode_header(assertion)?;
    Ok(if is_hmac(header.alg) {
        TokenEndpointAuthMethod::ClientSecretJwt
    } else {
        TokenEndpointAuthMethod::PrivateKeyJwt
    })
}

/// Extracts the issuer from an assertion without verifying it.
///
/// Only used to decide which client's keys verify the assertion.
#[must_use]
pub fn peek_issuer(assertion: &str) -> Option<String> {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    #[derive(Deserialize)]
    struct MinimalClaims {
        #[serde(default)]
        iss: Option<String>,
        #[serde(default)]
        sub: Option<String>,
    }

    let payload = assertion.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: MinimalClaims = serde_json::from_slice(&bytes).ok()?;
    claims.iss.or(claims.sub)
}

fn decode_header(assertion: &str) -> Result<Header, AssertionError> {
    jsonwebtoken::decode_header(assertion).map_err(|e| AssertionError::Malformed(e.to_string()))
}

fn decoding_keys(client: &Client, header: &Header) -> Vec<DecodingKey> {
    if is_hmac(header.alg) {
        return client
            .client_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .map(|secret| vec![DecodingKey::from_secret(secret.as_bytes())])
            .unwrap_or_default();
    }

    let Some(jwks) = &client.jwks else {
        return Vec::new();
    };
    jwks.keys
        .iter()
        .filter(|jwk| match (&header.kid, &jwk.common.key_id) {
            (Some(kid), Some(key_id)) => kid == key_id,
            _ => true,
        })
        .filter_map(|jwk| DecodingKey::from_jwk(jwk).ok())
        .collect()
}

/// Verifies an assertion issued by `client`.
///
/// Checks the signature, `iss == client_id`, `exp`, the audience when one is
/// given, the maximum lifetime and, when `expected_subject` is set, `sub`.
///
/// # Errors
///
/// Returns an [`AssertionError`] describing the first failed check.
pub fn verify_assertion(
    assertion: &str,
    client: &Client,
    expected_subject: Option<&str>,
    audience: Option<&str>,
    config: &AssertionConfig,
) -> Result<AssertionClaims, AssertionError> {
    let header = decode_header(assertion)?;
    let keys = decoding_keys(client, &header);
    if keys.is_empty() {
        return Err(AssertionError::NoKey);
    }

    let mut validation = Validation::new(header.alg);
    validation.leeway = config.leeway.as_secs();
    validation.set_issuer(&[client.client_id.as_str()]);
    validation.set_required_spec_claims(&["exp", "iss"]);
    match audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }

    let mut last_error = None;
    let mut verified = None;
    for key in &keys {
        match jsonwebtoken::decode::<AssertionClaims>(assertion, key, &validation) {
            Ok(data) => {
                verified = Some(data.claims);
                break;
            }
            Err(e) => last_error = Some(e),
        }
    }
    let claims = verified.ok_or_else(|| {
        AssertionError::Invalid(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "signature verification failed".to_string()),
        )
    })?;

    if let Some(expected) = expected_subject
        && claims.sub.as_deref() != Some(expected)
    {
        return Err(AssertionError::SubjectMismatch);
    }

    let max_lifetime = config.max_lifetime.as_secs();
    let horizon = OffsetDateTime::now_utc().unix_timestamp()
        + i64::try_from(max_lifetime + config.leeway.as_secs()).unwrap_or(i64::MAX);
    if claims.exp > horizon {
        return Err(AssertionError::LifetimeTooLong(max_lifetime));
    }

    Ok(claims)
}
