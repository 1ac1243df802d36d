//! In-memory storage backend for the grantflow authorization server.
//!
//! [`MemoryStore`] implements every storage trait from
//! [`grantflow::storage`] on top of concurrent `DashMap`s. Data lives only as
//! long as the process.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use grantflow::AuthorizationServer;
//! use grantflow_memory::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new().with_client(client).with_user(user, "secret")?);
//! let server = AuthorizationServer::builder()
//!     .clients(store.clone())
//!     .tokens(store.clone())
//!     .codes(store.clone())
//!     .users(store.clone())
//!     .devices(store)
//!     .with_default_grants()
//!     .build()?;
//! ```

pub mod password;
mod store;

pub use password::{hash_password, verify_password};
pub use store::{MemoryStore, PurgeStats};
