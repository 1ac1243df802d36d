//! # grantflow
//!
//! OAuth 2.0 authorization server grant-processing engine.
//!
//! This crate provides:
//! - Authorization endpoint flows (implicit, authorization code with PKCE)
//! - Token endpoint grants (authorization code, client credentials,
//!   password, refresh token, device code, JWT bearer)
//! - Client authentication (basic, post, `client_secret_jwt`,
//!   `private_key_jwt`, public clients)
//! - Token revocation (RFC 7009) and introspection (RFC 7662)
//! - RFC 6749 error rendering as redirects or JSON bodies
//!
//! ## Overview
//!
//! The engine is transport-neutral: [`AuthorizationServer`] takes an
//! [`OAuth2Request`](oauth::OAuth2Request) and returns an
//! [`OAuth2Response`](oauth::OAuth2Response). Persistence is delegated to
//! the traits in [`storage`]; the [`http`] module adapts both value types
//! to axum.
//!
//! ## Modules
//!
//! - [`config`] - Server configuration
//! - [`error`] - OAuth 2.0 error vocabulary and storage errors
//! - [`oauth`] - Grants, client authentication and the server dispatcher
//! - [`storage`] - Storage traits for clients, tokens, codes, users, devices
//! - [`types`] - Clients, tokens and other persisted records
//! - [`http`] - Axum extractors and handlers

pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod storage;
pub mod types;

pub use config::{ConfigError, ServerConfig};
pub use error::{ErrorCode, OAuth2Error, OAuth2Result, StorageError};
pub use oauth::{AuthorizationServer, AuthorizationServerBuilder, OAuth2Request, OAuth2Response};
pub use types::{Client, GrantType, ResponseType, Token, User};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use grantflow::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigError, ServerConfig};
    pub use crate::error::{ErrorCode, OAuth2Error, OAuth2Result, StorageError};
    pub use crate::oauth::{
        AuthorizationGrant, AuthorizationServer, AuthorizationServerBuilder, Grant, OAuth2Request,
        OAuth2Response, Prompt, Scope, TokenGenerator, TokenGrant,
    };
    pub use crate::storage::{
        AuthorizationCodeStore, ClientStore, DeviceStore, TokenStore, UserStore,
    };
    pub use crate::types::{
        AuthorizationCode, Client, DeviceCredential, DeviceStatus, GrantType, ResponseMode,
        ResponseType, Token, TokenEndpointAuthMethod, TokenResponse, User,
    };
}
