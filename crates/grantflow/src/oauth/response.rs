//! Framework-neutral response value.

use axum::http::StatusCode;

use crate::types::ResponseMode;

/// Response body variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// No body.
    Empty,
    /// A JSON document.
    Json(serde_json::Value),
    /// Plain text.
    Text(String),
}

/// A response produced by the authorization server.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuth2Response {
    /// HTTP status.
    pub status: StatusCode,
    /// Headers in emission order.
    pub headers: Vec<(String, String)>,
    /// Body.
    pub body: ResponseBody,
}

impl OAuth2Response {
    /// A JSON response carrying the no-store cache headers required for
    /// token and error payloads.
    #[must_use]
    pub fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Cache-Control".to_string(), "no-store".to_string()),
                ("Pragma".to_string(), "no-cache".to_string()),
            ],
            body: ResponseBody::Json(body),
        }
    }

    /// A `302 Found` redirect.
    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FOUND,
            headers: vec![("Location".to_string(), location.into())],
            body: ResponseBody::Empty,
        }
    }

    /// A plain text response.
    #[must_use]
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "text/plain; charset=utf-8".to_string())],
            body: ResponseBody::Text(body.into()),
        }
    }

    /// An empty `200 OK`.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: ResponseBody::Empty,
        }
    }

    /// Looks up a header case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The `Location` header of a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header("Location")
    }

    /// The JSON body, if any.
    #[must_use]
    pub fn json_body(&self) -> Option<&serde_json::Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Appends parameters to the query or fragment of a URI.
///
/// Existing query parameters and fragment content are preserved.
///
/// # Errors
///
/// Returns an error if `uri` is not an absolute URI.
pub fn add_params_to_uri<K, V>(
    uri: &str,
    params: impl IntoIterator<Item = (K, V)>,
    mode: ResponseMode,
) -> Result<String, url::ParseError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut url = url::Url::parse(uri)?;
    match mode {
        ResponseMode::Query => {
            url.query_pairs_mut().extend_pairs(params);
        }
        ResponseMode::Fragment => {
            let existing = url.fragment().unwrap_or_default().to_owned();
            let fragment = url::form_urlencoded::Serializer::for_suffix(existing, 0)
                .extend_pairs(params)
                .finish();
            url.set_fragment(Some(&fragment));
        }
    }
    Ok(url.into())
}
