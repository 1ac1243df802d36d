//! Validated authorization requests awaiting the end user's decision.

use crate::error::OAuth2Error;
use crate::oauth::pkce::PkceChallengeMethod;
use crate::oauth::scope::Scope;
use crate::types::{Client, ResponseMode, ResponseType};

/// What the hosting application should show before a decision can be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// The end user must log in first.
    Login,
    /// The end user must explicitly approve the request.
    Consent,
}

impl Prompt {
    /// Returns the prompt as its wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Consent => "consent",
        }
    }

    /// Parses the `prompt` request parameter. Unknown values are ignored.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        value.split_whitespace().find_map(|p| match p {
            "login" => Some(Self::Login),
            "consent" => Some(Self::Consent),
            _ => None,
        })
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authorization request that passed validation.
///
/// Lives for one request/response cycle and is never persisted. Holding a
/// `Grant` means the redirect URI is trusted, so later errors are delivered
/// to the client by redirect.
#[derive(Debug, Clone)]
pub struct Grant {
    /// The requesting client.
    pub client: Client,

    /// The requested response type.
    pub response_type: ResponseType,

    /// Redirect URI the response is delivered to.
    pub redirect_uri: String,

    /// The `redirect_uri` parameter exactly as sent, if any.
    pub requested_redirect_uri: Option<String>,

    /// How response parameters are attached to the redirect URI.
    pub response_mode: ResponseMode,

    /// Requested scope, already checked against the supported scopes.
    pub scope: Scope,

    /// Client state, echoed back verbatim.
    pub state: Option<String>,

    /// Nonce, bound to issued codes.
    pub nonce: Option<String>,

    /// PKCE challenge, authorization code flow only.
    pub code_challenge: Option<String>,

    /// PKCE challenge method.
    pub code_challenge_method: Option<PkceChallengeMethod>,

    /// UI hint for the hosting application. `None` means the request can be
    /// decided without further interaction.
    pub prompt: Option<Prompt>,
}

impl Grant {
    /// Attaches state and the redirect target to an error raised after
    /// validation.
    #[must_use]
    pub fn redirect_error(&self, err: OAuth2Error) -> OAuth2Error {
        err.with_state(self.state.as_deref())
            .with_redirect(self.redirect_uri.clone(), self.response_mode)
    }
}
