//! Async traits shared across all crmgate crates.
//!
//! Every cross-crate abstraction is defined here so that higher layers depend
//! only on `crmgate-types`, not on each other.

use crate::{Token, TokenFields, TokenGrant, unix_now};
use async_trait::async_trait;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, crate::GateError>;

/// Append-only persistent log of issued tokens.
///
/// Records are never updated or deleted. The current token is the record with
/// the greatest `created_at`, ties broken by insertion order.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Append a record stamped with `created_at`.
    ///
    /// Implementations clamp the timestamp so it never precedes the current
    /// latest record, and reject an empty refresh token.
    async fn append_at(&self, fields: &TokenFields, created_at: u64) -> Result<Token>;

    /// The current record, if any.
    async fn latest(&self) -> Result<Option<Token>>;

    /// The record written immediately before the current one. Diagnostic use only.
    async fn previous(&self) -> Result<Option<Token>>;

    /// Number of records in the log.
    async fn count(&self) -> Result<u64>;

    /// Append a record stamped with the current time.
    async fn append(&self, fields: &TokenFields) -> Result<Token> {
        self.append_at(fields, unix_now()).await
    }
}

/// A request against the provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantRequest {
    /// `grant_type=authorization_code`
    AuthorizationCode { code: String },
    /// `grant_type=refresh_token`
    RefreshToken { refresh_token: String },
}

impl GrantRequest {
    /// The OAuth `grant_type` value for this request.
    #[must_use]
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken { .. } => "refresh_token",
        }
    }
}

/// The provider's OAuth token endpoint.
///
/// Implementations attach client credentials, enforce a request timeout and
/// classify provider errors into [`crate::GateError`] variants, attaching the
/// raw provider body. An authorization-code response without a refresh token
/// is an [`crate::GateError::InvalidProviderResponse`].
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Perform a single token exchange. Never retries.
    async fn exchange(&self, request: &GrantRequest) -> Result<TokenGrant>;
}
