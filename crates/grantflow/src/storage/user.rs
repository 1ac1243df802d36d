//! Resource owner storage trait.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::User;

/// Lookup and credential checks for end users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StorageError>;

    /// Verify a username and password.
    ///
    /// Returns the user if the credentials are valid, `None` otherwise.
    /// Implementations must not reveal which of the two was wrong.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn authenticate(&self, username: &str, password: &str)
    -> Result<Option<User>, StorageError>;
}
