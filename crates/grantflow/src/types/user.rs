//! Resource owner representation.

use serde::{Deserialize, Serialize};

/// An end user (resource owner) as seen by the engine.
///
/// Credentials never live here; password checks go through
/// [`UserStore::authenticate`](crate::storage::UserStore::authenticate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier, used as the token subject.
    pub id: String,

    /// Login name.
    pub username: String,

    /// Disabled users cannot approve requests or obtain tokens.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    /// Creates an active user.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            active: true,
        }
    }

    /// Returns the identifier embedded in tokens.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.id
    }
}
