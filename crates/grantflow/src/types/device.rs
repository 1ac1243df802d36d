//! Device authorization records (RFC 8628).

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The user's decision on a pending device authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceStatus {
    /// Waiting for the user to visit the verification URI.
    Pending,
    /// The user approved the request.
    Approved {
        /// The approving user.
        user_id: String,
    },
    /// The user denied the request.
    Denied,
}

/// A device code / user code pair awaiting user interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredential {
    /// Code polled by the device at the token endpoint.
    pub device_code: String,

    /// Short code the user types at the verification URI.
    pub user_code: String,

    /// Client that started the flow.
    pub client_id: String,

    /// Requested scope, space-delimited.
    pub scope: String,

    /// Issue time.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// Expiry of both codes.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Minimum polling interval in seconds.
    pub interval: u64,

    /// Current decision.
    pub status: DeviceStatus,
}

impl DeviceCredential {
    /// Returns `true` if the device code can no longer be redeemed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }

    /// Returns `true` if the device code was issued to the client.
    #[must_use]
    pub fn check_client(&self, client_id: &str) -> bool {
        self.client_id == client_id
    }
}
