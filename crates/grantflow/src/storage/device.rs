//! Device authorization storage trait (RFC 8628).

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::types::{DeviceCredential, DeviceStatus};

/// Persistence of pending device authorizations.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Store a new device credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the device or user code collides with an existing
    /// one, or the storage operation fails.
    async fn save_device(&self, credential: &DeviceCredential) -> Result<(), StorageError>;

    /// Find a credential by device code.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn query_device(
        &self,
        device_code: &str,
    ) -> Result<Option<DeviceCredential>, StorageError>;

    /// Find a credential by user code.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn query_user_code(
        &self,
        user_code: &str,
    ) -> Result<Option<DeviceCredential>, StorageError>;

    /// Record the user's decision. Returns `false` if the user code is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn set_status(&self, user_code: &str, status: DeviceStatus)
    -> Result<bool, StorageError>;

    /// Record a poll and return the previous poll time.
    ///
    /// # Atomicity
    ///
    /// Read and write must happen in one step so concurrent polls each see
    /// the other's timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn record_poll(
        &self,
        device_code: &str,
        at: OffsetDateTime,
    ) -> Result<Option<OffsetDateTime>, StorageError>;

    /// Remove a credential once tokens have been issued for it.
    /// Returns the credential if it was still present.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn remove_device(
        &self,
        device_code: &str,
    ) -> Result<Option<DeviceCredential>, StorageError>;
}
