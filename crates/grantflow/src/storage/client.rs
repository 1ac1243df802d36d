//! Client storage trait.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::Client;

/// Lookup of registered OAuth 2.0 clients.
///
/// # Example
///
/// ```ignore
/// use grantflow::storage::ClientStore;
///
/// async fn example(store: &impl ClientStore) {
///     if let Some(client) = store.get_client("my-app").await? {
///         println!("Found client: {}", client.client_id);
///     }
/// }
/// ```
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Find a client by its client_id.
    ///
    /// Returns `None` if no such client is registered. Inactive clients are
    /// returned and rejected by the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>, StorageError>;
}
