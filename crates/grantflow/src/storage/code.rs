//! Authorization code storage trait.
//!
//! # Atomicity
//!
//! [`AuthorizationCodeStore::consume_code`] must remove and return the code
//! in one step. Two concurrent exchanges of the same code must never both
//! observe it.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::AuthorizationCode;

/// Persistence of single-use authorization codes.
#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    /// Store a newly issued code.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn save_code(&self, code: &AuthorizationCode) -> Result<(), StorageError>;

    /// Atomically remove and return a code.
    ///
    /// Returns `None` if the code does not exist or was already consumed.
    /// Expired codes are returned; the grant rejects them.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn consume_code(&self, code: &str) -> Result<Option<AuthorizationCode>, StorageError>;
}
