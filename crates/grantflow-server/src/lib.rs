//! HTTP host for the grantflow authorization server.
//!
//! Loads an [`AppConfig`], seeds a [`grantflow_memory::MemoryStore`] with
//! fixture clients and users, and serves the OAuth 2.0 endpoints with axum.

pub mod config;
pub mod fixtures;
pub mod handlers;
pub mod observability;
pub mod server;

pub use config::{AppConfig, ConfigSource, resolve_config_path};
pub use fixtures::{FixtureError, Fixtures, FixturesConfig, UserFixture};
pub use observability::init_tracing;
pub use server::{AppState, GrantflowServer, ServerBuilder, ServerError, build_app, build_state};
