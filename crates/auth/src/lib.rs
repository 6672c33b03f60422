//! Zoho OAuth token lifecycle.
//!
//! [`AuthorizationFlow`] bootstraps the first token pair from a consent
//! code, and [`AuthManager`] keeps handing out valid access tokens by
//! refreshing them through a [`TokenEndpoint`](crmgate_types::TokenEndpoint).
//! Provider-specific URL building and response classification live in [`zoho`].

pub mod endpoint;
pub mod flow;
pub mod manager;
pub mod zoho;

#[cfg(test)]
mod testing;

pub use endpoint::HttpTokenEndpoint;
pub use flow::AuthorizationFlow;
pub use manager::{AuthManager, TokenStatus, TokenSummary};
