//! Core types and traits for the crmgate workspace.
//!
//! This crate defines the shared abstractions used across all layers of the
//! gateway: the persisted OAuth token record, the error taxonomy, and the async
//! traits implemented by the token store and the provider token endpoint.

pub mod error;
pub mod token;
pub mod traits;

pub use error::GateError;
pub use token::{Token, TokenFields, TokenGrant, TokenState, unix_now};
pub use traits::{GrantRequest, TokenEndpoint, TokenStore};
