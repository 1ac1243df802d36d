//! Token storage trait.
//!
//! # Security Considerations
//!
//! - Never log token values
//! - Lookups by refresh token should not reveal whether a value exists to
//!   clients other than its owner

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{Token, TokenTypeHint};

/// Persistence of issued bearer tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a newly issued token.
    ///
    /// # Errors
    ///
    /// Returns an error if a token with the same access or refresh value
    /// exists, or the storage operation fails.
    async fn save_token(&self, token: &Token) -> Result<(), StorageError>;

    /// Find a token by its access or refresh token value.
    ///
    /// With a hint only the matching index is searched; without one the
    /// access token index is tried first.
    ///
    /// Revoked and expired tokens are still returned; callers decide.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn query_token(
        &self,
        value: &str,
        hint: Option<TokenTypeHint>,
    ) -> Result<Option<Token>, StorageError>;

    /// Revoke the token record identified by its access token.
    ///
    /// Revokes both the access token and the paired refresh token. Returns
    /// `true` only for the call that moved the record from active to
    /// revoked; `false` if it does not exist or was already revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_token(&self, access_token: &str) -> Result<bool, StorageError>;
}
