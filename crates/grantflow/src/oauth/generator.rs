//! Token value generation.
//!
//! All randomness comes from the operating system CSPRNG. A custom access
//! token format can be injected at server construction through
//! [`TokenGenerator`], either as a type or as a plain closure:
//!
//! ```
//! use grantflow::oauth::generator::{TokenGenerator, generate_token};
//! use grantflow::types::{Client, GrantType, User};
//! use grantflow::oauth::scope::Scope;
//!
//! let prefixed = |client: &Client, grant: GrantType, user: Option<&User>, _: &Scope| {
//!     let mut token = format!("{}-{}", &client.client_id[..1], grant);
//!     if let Some(user) = user {
//!         token = format!("{token}.{}", user.id);
//!     }
//!     format!("{token}.{}", generate_token(32))
//! };
//!
//! let client = Client::new("implicit-client");
//! let user = User::new("1", "foo");
//! let token = prefixed.generate(&client, GrantType::Implicit, Some(&user), &Scope::default());
//! assert!(token.starts_with("i-implicit.1."));
//! ```

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use time::OffsetDateTime;

use crate::config::TokenConfig;
use crate::oauth::scope::Scope;
use crate::types::{Client, GrantType, Token, User};

/// Length of tokens produced by [`RandomTokenGenerator::default`].
pub const DEFAULT_TOKEN_LENGTH: usize = 42;

/// Alphabet used for device user codes (no vowels, no ambiguous glyphs).
const USER_CODE_ALPHABET: &[u8] = b"BCDFGHJKLMNPQRSTVWXZ";

/// Generates an alphanumeric token from the OS CSPRNG.
#[must_use]
pub fn generate_token(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generates a device user code formatted as `XXXX-XXXX`.
#[must_use]
pub fn generate_user_code(length: usize) -> String {
    let chars: Vec<char> = (0..length)
        .map(|_| USER_CODE_ALPHABET[OsRng.gen_range(0..USER_CODE_ALPHABET.len())] as char)
        .collect();
    let (head, tail) = chars.split_at(length / 2);
    format!(
        "{}-{}",
        head.iter().collect::<String>(),
        tail.iter().collect::<String>()
    )
}

/// Produces opaque token values.
pub trait TokenGenerator: Send + Sync {
    /// Generates a token value for the given issuance context.
    fn generate(
        &self,
        client: &Client,
        grant_type: GrantType,
        user: Option<&User>,
        scope: &Scope,
    ) -> String;
}

impl<F> TokenGenerator for F
where
    F: Fn(&Client, GrantType, Option<&User>, &Scope) -> String + Send + Sync,
{
    fn generate(
        &self,
        client: &Client,
        grant_type: GrantType,
        user: Option<&User>,
        scope: &Scope,
    ) -> String {
        self(client, grant_type, user, scope)
    }
}

/// Random alphanumeric tokens of a fixed length.
#[derive(Debug, Clone, Copy)]
pub struct RandomTokenGenerator {
    length: usize,
}

impl RandomTokenGenerator {
    /// Creates a generator producing tokens of `length` characters.
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomTokenGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LENGTH)
    }
}

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self, _: &Client, _: GrantType, _: Option<&User>, _: &Scope) -> String {
        generate_token(self.length)
    }
}

/// Builds complete bearer [`Token`] records.
#[derive(Clone)]
pub struct BearerTokenGenerator {
    access: Arc<dyn TokenGenerator>,
    refresh: Arc<dyn TokenGenerator>,
    config: TokenConfig,
}

impl std::fmt::Debug for BearerTokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BearerTokenGenerator {
    /// Creates a generator using random values for both token kinds.
    #[must_use]
    pub fn new(config: TokenConfig) -> Self {
        let random = Arc::new(RandomTokenGenerator::new(config.token_length));
        Self {
            access: random.clone(),
            refresh: random,
            config,
        }
    }

    /// Replaces the access token generator.
    #[must_use]
    pub fn with_access_generator(mut self, generator: Arc<dyn TokenGenerator>) -> Self {
        self.access = generator;
        self
    }

    /// Replaces the refresh token generator.
    #[must_use]
    pub fn with_refresh_generator(mut self, generator: Arc<dyn TokenGenerator>) -> Self {
        self.refresh = generator;
        self
    }

    /// Access token lifetime: client override, then per-grant configuration.
    #[must_use]
    pub fn expires_in(&self, client: &Client, grant_type: GrantType) -> Duration {
        client
            .access_token_lifetime
            .unwrap_or_else(|| self.config.lifetime_for(grant_type))
    }

    /// Generates a token record. The record is not persisted.
    #[must_use]
    pub fn generate(
        &self,
        client: &Client,
        grant_type: GrantType,
        user: Option<&User>,
        scope: &Scope,
        include_refresh_token: bool,
    ) -> Token {
        let issued_at = OffsetDateTime::now_utc();
        let expires_in = i64::try_from(self.expires_in(client, grant_type).as_secs()).unwrap_or(i64::MAX);

        let (refresh_token, refresh_token_expires_at) = if include_refresh_token {
            let lifetime = time::Duration::try_from(self.config.refresh_token_lifetime)
                .unwrap_or(time::Duration::MAX);
            (
                Some(self.refresh.generate(client, grant_type, user, scope)),
                issued_at.checked_add(lifetime),
            )
        } else {
            (None, None)
        };

        Token {
            access_token: self.access.generate(client, grant_type, user, scope),
            token_type: "Bearer".to_string(),
            client_id: client.client_id.clone(),
            user_id: user.map(|u| u.id.clone()),
            scope: scope.to_string(),
            issued_at,
            expires_in,
            refresh_token,
            refresh_token_expires_at,
            revoked_at: None,
        }
    }
}
