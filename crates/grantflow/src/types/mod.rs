//! Core data model.

pub mod client;
pub mod code;
pub mod device;
pub mod token;
pub mod user;

pub use client::{
    Client, ClientValidationError, GrantType, ResponseMode, ResponseType, TokenEndpointAuthMethod,
};
pub use code::AuthorizationCode;
pub use device::{DeviceCredential, DeviceStatus};
pub use token::{Token, TokenResponse, TokenTypeHint};
pub use user::User;
