//! Storage traits for OAuth 2.0 artifacts.
//!
//! This module defines the narrow interfaces the engine calls for:
//!
//! - Client registrations
//! - Issued access and refresh tokens
//! - Single-use authorization codes
//! - Resource owners
//! - Pending device authorizations
//!
//! # Implementations
//!
//! Storage implementations are provided in separate crates:
//!
//! - `grantflow-memory` - concurrent in-memory backend

pub mod client;
pub mod code;
pub mod device;
pub mod token;
pub mod user;

pub use client::ClientStore;
pub use code::AuthorizationCodeStore;
pub use device::DeviceStore;
pub use token::TokenStore;
pub use user::UserStore;
