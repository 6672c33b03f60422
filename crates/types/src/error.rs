//! Unified error type for the crmgate workspace.

use thiserror::Error;

/// Enumerates all error kinds that can occur across crmgate crates.
///
/// Provider failures are classified once, where the token response is parsed,
/// so nothing downstream re-inspects raw provider strings.
#[derive(Debug, Clone, Error)]
pub enum GateError {
    /// No token has been stored yet; the authorization flow must be completed.
    #[error("no token found; authorization flow must be completed first")]
    Unauthenticated,

    /// The exchange succeeded at the transport level but the body is unusable.
    #[error("invalid provider response: {reason}; body={body}")]
    InvalidProviderResponse { reason: String, body: String },

    /// Transport failure, timeout or unexpected non-success status.
    #[error("token exchange failed: status={}, body={body}", display_status(.status))]
    UpstreamExchangeFailure { status: Option<u16>, body: String },

    /// The refresh token is invalid or revoked.
    #[error("refresh token rejected by provider; re-run the authorization flow: {body}")]
    InvalidGrant { body: String },

    /// The provider is throttling token requests.
    #[error("rate limited by provider: {body}")]
    RateLimited { body: String },

    /// Any other OAuth error code (e.g. `invalid_client`).
    #[error("provider rejected token request ({code}): {body}")]
    ProviderRejected { code: String, body: String },

    /// Persistent storage failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Malformed inbound request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),
}

#[allow(clippy::ref_option)]
fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

// ── Feature-gated From impls ──────────────────────────────────────────────────

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for GateError {
    fn from(e: sqlx::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl GateError {
    /// Returns `true` if the caller may retry later (with its own back-off).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamExchangeFailure { .. } | Self::RateLimited { .. }
        )
    }

    /// Returns `true` if the operator has to re-run the authorization flow.
    #[must_use]
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::InvalidGrant { .. })
    }
}
