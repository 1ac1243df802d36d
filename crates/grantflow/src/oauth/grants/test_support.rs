//! Minimal stores for grant unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::config::ServerConfig;
use crate::error::StorageError;
use crate::oauth::generator::BearerTokenGenerator;
use crate::oauth::grants::GrantContext;
use crate::storage::{AuthorizationCodeStore, ClientStore, DeviceStore, TokenStore, UserStore};
use crate::types::{
    AuthorizationCode, Client, DeviceCredential, DeviceStatus, Token, TokenTypeHint, User,
};

#[derive(Default)]
pub(crate) struct Stores {
    pub clients: Mutex<HashMap<String, Client>>,
    pub tokens: Mutex<Vec<Token>>,
    pub codes: Mutex<HashMap<String, AuthorizationCode>>,
    pub users: Mutex<HashMap<String, (User, String)>>,
    pub devices: Mutex<HashMap<String, (DeviceCredential, Option<OffsetDateTime>)>>,
}

impl Stores {
    pub fn with_client(self, client: Client) -> Self {
        self.clients
            .lock()
            .unwrap()
            .insert(client.client_id.clone(), client);
        self
    }

    pub fn with_user(self, user: User, password: &str) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(user.id.clone(), (user, password.to_string()));
        self
    }

    pub fn token_count(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }
}

pub(crate) fn context(stores: &Arc<Stores>, config: ServerConfig) -> GrantContext {
    GrantContext {
        generator: BearerTokenGenerator::new(config.tokens.clone()),
        config,
        clients: stores.clone(),
        tokens: stores.clone(),
        codes: Some(stores.clone()),
        users: Some(stores.clone()),
        devices: Some(stores.clone()),
    }
}

#[async_trait]
impl ClientStore for Stores {
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>, StorageError> {
        Ok(self.clients.lock().unwrap().get(client_id).cloned())
    }
}

#[async_trait]
impl TokenStore for Stores {
    async fn save_token(&self, token: &Token) -> Result<(), StorageError> {
        self.tokens.lock().unwrap().push(token.clone());
        Ok(())
    }

    async fn query_token(
        &self,
        value: &str,
        hint: Option<TokenTypeHint>,
    ) -> Result<Option<Token>, StorageError> {
        let tokens = self.tokens.lock().unwrap();
        let by_access = || tokens.iter().find(|t| t.access_token == value);
        let by_refresh = || tokens.iter().find(|t| t.refresh_token.as_deref() == Some(value));
        let found = match hint {
            Some(TokenTypeHint::AccessToken) => by_access(),
            Some(TokenTypeHint::RefreshToken) => by_refresh(),
            None => by_access().or_else(by_refresh),
        };
        Ok(found.cloned())
    }

    async fn revoke_token(&self, access_token: &str) -> Result<bool, StorageError> {
        let mut tokens = self.tokens.lock().unwrap();
        match tokens
            .iter_mut()
            .find(|t| t.access_token == access_token && t.revoked_at.is_none())
        {
            Some(token) => {
                token.revoked_at = Some(OffsetDateTime::now_utc());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AuthorizationCodeStore for Stores {
    async fn save_code(&self, code: &AuthorizationCode) -> Result<(), StorageError> {
        self.codes
            .lock()
            .unwrap()
            .insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn consume_code(&self, code: &str) -> Result<Option<AuthorizationCode>, StorageError> {
        Ok(self.codes.lock().unwrap().remove(code))
    }
}

#[async_trait]
impl UserStore for Stores {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(user_id)
            .map(|(user, _)| user.clone()))
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, StorageError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|(user, secret)| user.username == username && secret == password)
            .map(|(user, _)| user.clone()))
    }
}

#[async_trait]
impl DeviceStore for Stores {
    async fn save_device(&self, credential: &DeviceCredential) -> Result<(), StorageError> {
        self.devices
            .lock()
            .unwrap()
            .insert(credential.device_code.clone(), (credential.clone(), None));
        Ok(())
    }

    async fn query_device(
        &self,
        device_code: &str,
    ) -> Result<Option<DeviceCredential>, StorageError> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .get(device_code)
            .map(|(c, _)| c.clone()))
    }

    async fn query_user_code(
        &self,
        user_code: &str,
    ) -> Result<Option<DeviceCredential>, StorageError> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .values()
            .find(|(c, _)| c.user_code == user_code)
            .map(|(c, _)| c.clone()))
    }

    async fn set_status(
        &self,
        user_code: &str,
        status: DeviceStatus,
    ) -> Result<bool, StorageError> {
        let mut devices = self.devices.lock().unwrap();
        match devices.values_mut().find(|(c, _)| c.user_code == user_code) {
            Some((credential, _)) => {
                credential.status = status;
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
        let mut devices = self.devices.lock().unwrap();
        Ok(devices
            .get_mut(device_code)
            .and_then(|(_, last)| last.replace(at)))
    }

    async fn remove_device(
        &self,
        device_code: &str,
    ) -> Result<Option<DeviceCredential>, StorageError> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .remove(device_code)
            .map(|(c, _)| c))
    }
}
