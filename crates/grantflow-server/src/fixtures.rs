//! Startup data for the in-memory store.
//!
//! Clients and users come from the `[fixtures]` table of the main
//! configuration and, optionally, from a separate TOML file:
//!
//! ```toml
//! [[clients]]
//! client_id = "implicit-client"
//! token_endpoint_auth_method = "none"
//! redirect_uris = ["http://localhost/authorized"]
//! response_types = ["token"]
//! grant_types = ["implicit"]
//! scope = "profile"
//!
//! [[users]]
//! id = "1"
//! username = "foo"
//! password = "ok"
//! ```

use std::path::PathBuf;

use grantflow::types::{Client, ClientValidationError, User};
use grantflow::StorageError;
use grantflow_memory::MemoryStore;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("cannot read fixtures file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse fixtures file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid client '{client_id}': {source}")]
    InvalidClient {
        client_id: String,
        #[source]
        source: ClientValidationError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A user with a plain-text password, hashed on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFixture {
    pub id: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl UserFixture {
    fn to_user(&self) -> User {
        let mut user = User::new(&self.id, &self.username);
        user.active = self.active;
        user
    }
}

/// Contents of a fixtures file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub users: Vec<UserFixture>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixturesConfig {
    /// Optional TOML file with more clients and users.
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub users: Vec<UserFixture>,
}

impl FixturesConfig {
    /// Merges the inline fixtures with the fixtures file, if any.
    pub fn load(&self) -> Result<Fixtures, FixtureError> {
        let mut fixtures = Fixtures {
            clients: self.clients.clone(),
            users: self.users.clone(),
        };
        if let Some(path) = &self.file {
            let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
                path: path.clone(),
                source,
            })?;
            let from_file: Fixtures =
                toml::from_str(&content).map_err(|source| FixtureError::Parse {
                    path: path.clone(),
                    source,
                })?;
            fixtures.clients.extend(from_file.clients);
            fixtures.users.extend(from_file.users);
        }
        Ok(fixtures)
    }
}

impl Fixtures {
    /// Validates every client and inserts everything into the store.
    pub fn seed(&self, store: &MemoryStore) -> Result<(), FixtureError> {
        for client in &self.clients {
            client
                .validate()
                .map_err(|source| FixtureError::InvalidClient {
                    client_id: client.client_id.clone(),
                    source,
                })?;
            store.insert_client(client.clone());
        }
        for user in &self.users {
            store.insert_user(user.to_user(), &user.password)?;
        }
        tracing::info!(
            clients = self.clients.len(),
            users = self.users.len(),
            "Fixtures seeded"
        );
        Ok(())
    }
}
