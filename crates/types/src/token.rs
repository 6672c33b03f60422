//! OAuth token records and expiry logic.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in whole seconds since the Unix epoch.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// The writable part of a token record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFields {
    pub access_token: String,
    pub refresh_token: String,
    /// Provider-declared lifetime of `access_token`, in seconds.
    pub expires_in: u64,
}

/// A persisted token record.
///
/// Records are immutable once written; the store is an append-only log and the
/// current token is the one with the greatest `created_at` (ties broken by `id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Store-assigned insertion sequence.
    pub id: i64,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    /// Unix seconds at which the record was written.
    pub created_at: u64,
}

impl Token {
    /// Unix seconds at which the access token stops being accepted upstream.
    #[must_use]
    pub fn expires_at(&self) -> u64 {
        self.created_at.saturating_add(self.expires_in)
    }

    /// Classify the token at `now`, treating it as stale once it is within
    /// `margin_secs` of its expiry. A zero margin is exact-expiry.
    #[must_use]
    pub fn state_at(&self, now: u64, margin_secs: u64) -> TokenState {
        if now.saturating_add(margin_secs) >= self.expires_at() {
            TokenState::Stale
        } else {
            TokenState::Fresh
        }
    }

    /// Classify the token against the current wall clock.
    #[must_use]
    pub fn state(&self, margin_secs: u64) -> TokenState {
        self.state_at(unix_now(), margin_secs)
    }

    #[must_use]
    pub fn fields(&self) -> TokenFields {
        TokenFields {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_in: self.expires_in,
        }
    }
}

/// Freshness of a stored access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Fresh,
    /// Expired or inside the refresh margin; must be renewed before use.
    Stale,
}

/// A successful, validated token response from the provider.
///
/// `refresh_token` is `None` when the provider withheld it, which is normal on
/// refresh-token grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

impl TokenGrant {
    /// Build the fields to persist, carrying `previous_refresh` forward when the
    /// grant does not rotate the refresh token.
    #[must_use]
    pub fn into_fields(self, previous_refresh: &str) -> TokenFields {
        let refresh_token = self
            .refresh_token
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| previous_refresh.to_string());
        TokenFields {
            access_token: self.access_token,
            refresh_token,
            expires_in: self.expires_in,
        }
    }
}
