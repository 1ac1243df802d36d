//! OAuth 2.0 authorization server implementation.
//!
//! This module provides the protocol engine:
//!
//! - Request and response value objects
//! - Client authentication at the token endpoint
//! - Grant handlers for every supported flow
//! - PKCE (RFC 7636) and JWT assertions (RFC 7523)
//! - The [`AuthorizationServer`](server::AuthorizationServer) dispatcher
//!
//! # Example
//!
//! ```ignore
//! use grantflow::oauth::{AuthorizationServer, OAuth2Request};
//!
//! let request = OAuth2Request::new(Method::GET, "/authorize?response_type=token&client_id=app");
//! let grant = server.validate_consent_request(&request, None).await?;
//! let response = server.create_authorization_response(&request, Some(&user)).await;
//! ```

pub mod assertion;
pub mod client_auth;
pub mod consent;
pub mod generator;
pub mod grants;
pub mod introspection;
pub mod pkce;
pub mod request;
pub mod response;
pub mod scope;
pub mod server;

pub use client_auth::{AuthenticatedClient, authenticate_client};
pub use consent::{Grant, Prompt};
pub use generator::{BearerTokenGenerator, RandomTokenGenerator, TokenGenerator, generate_token};
pub use grants::{AuthorizationGrant, GrantContext, TokenGrant};
pub use introspection::IntrospectionResponse;
pub use pkce::PkceChallengeMethod;
pub use request::OAuth2Request;
pub use response::{OAuth2Response, ResponseBody};
pub use scope::Scope;
pub use server::{AuthorizationServer, AuthorizationServerBuilder};
