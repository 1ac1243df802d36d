//! Immutable request value passed through the engine.
//!
//! An [`OAuth2Request`] is built once per HTTP call from the query string,
//! the form body and the `Authorization` header. Grants only ever read it.

use std::collections::HashMap;

use axum::http::Method;

use crate::oauth::scope::Scope;

/// A protocol request as seen by grant handlers.
#[derive(Debug, Clone)]
pub struct OAuth2Request {
    method: Method,
    uri: String,
    secure: bool,
    params: HashMap<String, String>,
    authorization: Option<String>,
}

impl OAuth2Request {
    /// Creates a request from a method and a URI (absolute or origin-form).
    ///
    /// Query parameters are taken from the URI. The transport is considered
    /// secure when the URI scheme is `https`.
    #[must_use]
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let secure = uri.starts_with("https://");
        let mut request = Self {
            method,
            uri,
            secure,
            params: HashMap::new(),
            authorization: None,
        };
        let query = request
            .uri
            .split_once('?')
            .map(|(_, query)| query.split('#').next().unwrap_or_default().to_owned());
        if let Some(query) = query {
            request = request.with_params(url::form_urlencoded::parse(query.as_bytes()).into_owned());
        }
        request
    }

    /// Merges parameters. Later values win; empty values are ignored.
    #[must_use]
    pub fn with_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in params {
            let value = value.into();
            if !value.is_empty() {
                self.params.insert(key.into(), value);
            }
        }
        self
    }

    /// Sets a single parameter.
    #[must_use]
    pub fn with_param(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_params([(key.into(), value.into())])
    }

    /// Merges an `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn with_form_body(self, body: &[u8]) -> Self {
        let params: Vec<(String, String)> = url::form_urlencoded::parse(body).into_owned().collect();
        self.with_params(params)
    }

    /// Sets the raw `Authorization` header.
    #[must_use]
    pub fn with_authorization(mut self, header: impl Into<String>) -> Self {
        self.authorization = Some(header.into());
        self
    }

    /// Overrides transport security detection.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URI as received.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Whether the request arrived over TLS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Raw `Authorization` header.
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// Any parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.param("client_id")
    }

    #[must_use]
    pub fn client_secret(&self) -> Option<&str> {
        self.param("client_secret")
    }

    #[must_use]
    pub fn client_assertion(&self) -> Option<&str> {
        self.param("client_assertion")
    }

    #[must_use]
    pub fn client_assertion_type(&self) -> Option<&str> {
        self.param("client_assertion_type")
    }

    #[must_use]
    pub fn response_type(&self) -> Option<&str> {
        self.param("response_type")
    }

    #[must_use]
    pub fn response_mode(&self) -> Option<&str> {
        self.param("response_mode")
    }

    #[must_use]
    pub fn grant_type(&self) -> Option<&str> {
        self.param("grant_type")
    }

    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.param("redirect_uri")
    }

    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.param("state")
    }

    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.param("nonce")
    }

    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.param("prompt")
    }

    /// Raw `scope` parameter.
    #[must_use]
    pub fn scope_param(&self) -> Option<&str> {
        self.param("scope")
    }

    /// Parsed `scope` parameter; empty when absent.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope_param().map(Scope::parse).unwrap_or_default()
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.param("code")
    }

    #[must_use]
    pub fn code_challenge(&self) -> Option<&str> {
        self.param("code_challenge")
    }

    #[must_use]
    pub fn code_challenge_method(&self) -> Option<&str> {
        self.param("code_challenge_method")
    }

    #[must_use]
    pub fn code_verifier(&self) -> Option<&str> {
        self.param("code_verifier")
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.param("refresh_token")
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.param("username")
    }

    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.param("password")
    }

    #[must_use]
    pub fn device_code(&self) -> Option<&str> {
        self.param("device_code")
    }

    #[must_use]
    pub fn assertion(&self) -> Option<&str> {
        self.param("assertion")
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.param("token")
    }

    #[must_use]
    pub fn token_type_hint(&self) -> Option<&str> {
        self.param("token_type_hint")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_parsed() {
        let request = OAuth2Request::new(
            Method::GET,
            "/oauth/authorize?response_type=token&client_id=implicit-client&scope=a%20b",
        );
        assert_eq!(request.response_type(), Some("token"));
        assert_eq!(request.client_id(), Some("implicit-client"));
        assert_eq!(request.scope().to_string(), "a b");
        assert!(!request.is_secure());
    }

    #[test]
    fn test_form_overrides_query() {
        let request = OAuth2Request::new(Method::POST, "/oauth/authorize?state=query&scope=profile")
            .with_form_body(b"state=form&user_id=1");
        assert_eq!(request.state(), Some("form"));
        assert_eq!(request.scope_param(), Some("profile"));
        assert_eq!(request.param("user_id"), Some("1"));
    }

    #[test]
    fn test_empty_values_ignored() {
        let request = OAuth2Request::new(Method::POST, "/token?scope=")
            .with_params([("client_secret", "")]);
        assert_eq!(request.scope_param(), None);
        assert_eq!(request.client_secret(), None);
        assert!(request.scope().is_empty());
    }

    #[test]
    fn test_secure_detection() {
        let request = OAuth2Request::new(Method::POST, "https://auth.example.com/token");
        assert!(request.is_secure());
        assert!(!request.with_secure(false).is_secure());
    }
}
