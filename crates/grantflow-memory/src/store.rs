use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use grantflow::error::StorageError;
use grantflow::storage::{AuthorizationCodeStore, ClientStore, DeviceStore, TokenStore, UserStore};
use grantflow::types::{
    AuthorizationCode, Client, DeviceCredential, DeviceStatus, Token, TokenTypeHint, User,
};

use crate::password::{hash_password, verify_password};

/// Refresh tokens are indexed by digest so the raw value is only kept on
/// the token record itself.
fn refresh_key(refresh_token: &str) -> String {
    hex::encode(Sha256::digest(refresh_token.as_bytes()))
}

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Debug, Clone)]
struct DeviceEntry {
    credential: DeviceCredential,
    last_polled_at: Option<OffsetDateTime>,
}

/// Counts removed by [`MemoryStore::purge_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    /// Tokens whose access and refresh values are both unusable.
    pub tokens: usize,
    /// Expired authorization codes.
    pub codes: usize,
    /// Expired device authorizations.
    pub devices: usize,
}

/// In-memory backend implementing every grantflow storage trait.
///
/// This storage implementation provides:
/// - Concurrent access via `DashMap` shards
/// - Atomic code consumption and poll recording through the entry API
/// - Argon2id password hashes for users
/// - A SHA-256 index from refresh token to token record
///
/// Cloning is cheap and clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    clients: Arc<DashMap<String, Client>>,
    tokens: Arc<DashMap<String, Token>>,
    refresh_index: Arc<DashMap<String, String>>,
    codes: Arc<DashMap<String, AuthorizationCode>>,
    users: Arc<DashMap<String, StoredUser>>,
    usernames: Arc<DashMap<String, String>>,
    devices: Arc<DashMap<String, DeviceEntry>>,
    user_codes: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client, replacing any client with the same id.
    pub fn insert_client(&self, client: Client) {
        self.clients.insert(client.client_id.clone(), client);
    }

    /// Registers a client and returns the store.
    #[must_use]
    pub fn with_client(self, client: Client) -> Self {
        self.insert_client(client);
        self
    }

    /// Registers a user with a password, stored as an Argon2id hash.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username belongs to another
    /// user, or `StorageError::Backend` if hashing fails.
    pub fn insert_user(&self, user: User, password: &str) -> Result<(), StorageError> {
        let password_hash =
            hash_password(password).map_err(|e| StorageError::backend(e.to_string()))?;

        match self.usernames.entry(user.username.clone()) {
            Entry::Occupied(entry) if entry.get() != &user.id => {
                return Err(StorageError::conflict(format!(
                    "username '{}' is already taken",
                    user.username
                )));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(user.id.clone());
            }
        }
        if let Some(previous) = self.users.insert(
            user.id.clone(),
            StoredUser {
                user: user.clone(),
                password_hash,
            },
        ) && previous.user.username != user.username
        {
            self.usernames.remove(&previous.user.username);
        }
        Ok(())
    }

    /// Registers a user and returns the store.
    ///
    /// # Errors
    ///
    /// See [`MemoryStore::insert_user`].
    pub fn with_user(self, user: User, password: &str) -> Result<Self, StorageError> {
        self.insert_user(user, password)?;
        Ok(self)
    }

    /// Number of stored token records, revoked ones included.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Drops records that can no longer be used.
    pub fn purge_expired(&self) -> PurgeStats {
        let mut stats = PurgeStats::default();

        let dead: Vec<Token> = self
            .tokens
            .iter()
            .filter(|entry| !entry.is_active() && !entry.is_refresh_active())
            .map(|entry| entry.value().clone())
            .collect();
        for token in dead {
            if self.tokens.remove(&token.access_token).is_some() {
                stats.tokens += 1;
            }
            if let Some(refresh_token) = &token.refresh_token {
                self.refresh_index.remove(&refresh_key(refresh_token));
            }
        }

        let before = self.codes.len();
        self.codes.retain(|_, code| !code.is_expired());
        stats.codes = before.saturating_sub(self.codes.len());

        let expired: Vec<(String, String)> = self
            .devices
            .iter()
            .filter(|entry| entry.credential.is_expired())
            .map(|entry| (entry.key().clone(), entry.credential.user_code.clone()))
            .collect();
        for (device_code, user_code) in expired {
            if self.devices.remove(&device_code).is_some() {
                stats.devices += 1;
            }
            self.user_codes.remove(&user_code);
        }

        if stats != PurgeStats::default() {
            tracing::debug!(
                tokens = stats.tokens,
                codes = stats.codes,
                devices = stats.devices,
                "Purged expired records"
            );
        }
        stats
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>, StorageError> {
        Ok(self.clients.get(client_id).map(|c| c.value().clone()))
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn save_token(&self, token: &Token) -> Result<(), StorageError> {
        let refresh = token.refresh_token.as_deref().map(refresh_key);
        if let Some(key) = &refresh
            && self.refresh_index.contains_key(key)
        {
            return Err(StorageError::conflict("refresh token already exists"));
        }

        match self.tokens.entry(token.access_token.clone()) {
            Entry::Occupied(_) => Err(StorageError::conflict("access token already exists")),
            Entry::Vacant(entry) => {
                entry.insert(token.clone());
                if let Some(key) = refresh {
                    self.refresh_index.insert(key, token.access_token.clone());
                }
                Ok(())
            }
        }
    }

    async fn query_token(
        &self,
        value: &str,
        hint: Option<TokenTypeHint>,
    ) -> Result<Option<Token>, StorageError> {
        let by_access = || self.tokens.get(value).map(|t| t.value().clone());
        let by_refresh = || {
            self.refresh_index
                .get(&refresh_key(value))
                .and_then(|access| self.tokens.get(access.value()).map(|t| t.value().clone()))
        };
        Ok(match hint {
            Some(TokenTypeHint::AccessToken) => by_access(),
            Some(TokenTypeHint::RefreshToken) => by_refresh(),
            None => by_access().or_else(by_refresh),
        })
    }

    async fn revoke_token(&self, access_token: &str) -> Result<bool, StorageError> {
        match self.tokens.get_mut(access_token) {
            Some(mut token) if token.revoked_at.is_none() => {
                token.revoked_at = Some(OffsetDateTime::now_utc());
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AuthorizationCodeStore for MemoryStore {
    async fn save_code(&self, code: &AuthorizationCode) -> Result<(), StorageError> {
        match self.codes.entry(code.code.clone()) {
            Entry::Occupied(_) => Err(StorageError::conflict("authorization code already exists")),
            Entry::Vacant(entry) => {
                entry.insert(code.clone());
                Ok(())
            }
        }
    }

    async fn consume_code(&self, code: &str) -> Result<Option<AuthorizationCode>, StorageError> {
        Ok(self.codes.remove(code).map(|(_, code)| code))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        Ok(self.users.get(user_id).map(|u| u.user.clone()))
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, StorageError> {
        let Some(user_id) = self.usernames.get(username).map(|id| id.value().clone()) else {
            return Ok(None);
        };
        let Some(stored) = self.users.get(&user_id).map(|u| u.value().clone()) else {
            return Ok(None);
        };
        if verify_password(password, &stored.password_hash) {
            Ok(Some(stored.user))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn save_device(&self, credential: &DeviceCredential) -> Result<(), StorageError> {
        match self.user_codes.entry(credential.user_code.clone()) {
            Entry::Occupied(_) => return Err(StorageError::conflict("user code already exists")),
            Entry::Vacant(entry) => {
                entry.insert(credential.device_code.clone());
            }
        }
        match self.devices.entry(credential.device_code.clone()) {
            Entry::Occupied(_) => {
                self.user_codes.remove(&credential.user_code);
                Err(StorageError::conflict("device code already exists"))
            }
            Entry::Vacant(entry) => {
                entry.insert(DeviceEntry {
                    credential: credential.clone(),
                    last_polled_at: None,
                });
                Ok(())
            }
        }
    }

    async fn query_device(
        &self,
        device_code: &str,
    ) -> Result<Option<DeviceCredential>, StorageError> {
        Ok(self.devices.get(device_code).map(|d| d.credential.clone()))
    }

    async fn query_user_code(
        &self,
        user_code: &str,
    ) -> Result<Option<DeviceCredential>, StorageError> {
        let Some(device_code) = self.user_codes.get(user_code).map(|d| d.value().clone()) else {
            return Ok(None);
        };
        Ok(self.devices.get(&device_code).map(|d| d.credential.clone()))
    }

    async fn set_status(
        &self,
        user_code: &str,
        status: DeviceStatus,
    ) -> Result<bool, StorageError> {
        let Some(device_code) = self.user_codes.get(user_code).map(|d| d.value().clone()) else {
            return Ok(false);
        };
        match self.devices.get_mut(&device_code) {
            Some(mut entry) => {
                entry.credential.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_poll(
        &self,
        device_code: &str,
        at: OffsetDateTime,
    ) -> Result<Option<OffsetDateTime>, StorageError> {
        Ok(self
            .devices
            .get_mut(device_code)
            .and_then(|mut entry| entry.last_polled_at.replace(at)))
    }

    async fn remove_device(
        &self,
        device_code: &str,
    ) -> Result<Option<DeviceCredential>, StorageError> {
        let removed = self.devices.remove(device_code).map(|(_, entry)| entry.credential);
        if let Some(credential) = &removed {
            self.user_codes.remove(&credential.user_code);
        }
        Ok(removed)
    }
}
