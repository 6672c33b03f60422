//! Token refresh manager.
//!
//! Responsibilities:
//! - Read the latest record from the append-only [`TokenStore`].
//! - Decide freshness with a configurable safety margin before expiry.
//! - Renew stale tokens with a refresh-token grant, carrying the previous
//!   refresh token forward when the provider withholds a new one.
//! - Coalesce concurrent refreshes into a single upstream exchange.
//!
//! The refresh runs in its own task, so a caller that gives up waiting cannot
//! abort an exchange whose rotated refresh token still has to be persisted.

use crmgate_types::{
    GateError, GrantRequest, Token, TokenEndpoint, TokenState, TokenStore, traits::Result,
};
use futures_util::future::{BoxFuture, FutureExt as _, Shared};
use serde::Serialize;
use std::sync::{Arc, Mutex};

type SharedRefresh = Shared<BoxFuture<'static, Result<Token>>>;

/// The refresh currently in flight, if any.
#[derive(Default)]
struct FlightSlot {
    generation: u64,
    current: Option<SharedRefresh>,
}

/// Hands out valid access tokens, refreshing them when they go stale.
pub struct AuthManager {
    store: Arc<dyn TokenStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    refresh_margin_secs: u64,
    in_flight: Arc<Mutex<FlightSlot>>,
}

/// Non-secret view of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenSummary {
    pub id: i64,
    pub created_at: u64,
    pub expires_at: u64,
    pub state: TokenState,
}

/// Diagnostic snapshot of the token log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub authenticated: bool,
    pub records: u64,
    pub latest: Option<TokenSummary>,
    pub previous: Option<TokenSummary>,
}

impl AuthManager {
    /// `refresh_margin_secs` is how long before expiry a token counts as
    /// stale; `0` refreshes only once it has actually expired.
    pub fn new(
        store: Arc<dyn TokenStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        refresh_margin_secs: u64,
    ) -> Self {
        Self {
            store,
            endpoint,
            refresh_margin_secs,
            in_flight: Arc::new(Mutex::new(FlightSlot::default())),
        }
    }

    /// Return an access token that is fresh under the configured margin.
    ///
    /// A fresh stored token is returned without any network call.
    ///
    /// # Errors
    ///
    /// - [`GateError::Unauthenticated`] if no token has been stored yet.
    /// - Any classified refresh failure ([`GateError::InvalidGrant`],
    ///   [`GateError::RateLimited`], [`GateError::UpstreamExchangeFailure`], …).
    /// - [`GateError::Persistence`] if the refreshed token could not be stored;
    ///   the new token is never handed out in that case.
    pub async fn get_valid_access_token(&self) -> Result<String> {
        let token = self
            .store
            .latest()
            .await?
            .ok_or(GateError::Unauthenticated)?;

        if token.state(self.refresh_margin_secs) == TokenState::Fresh {
            tracing::debug!(id = token.id, expires_at = token.expires_at(), "access token fresh");
            return Ok(token.access_token);
        }

        Ok(self.refresh(false).await?.access_token)
    }

    /// Refresh the latest record regardless of its freshness.
    ///
    /// Joins a refresh that is already in flight instead of starting a second one.
    ///
    /// # Errors
    ///
    /// Same as [`AuthManager::get_valid_access_token`].
    pub async fn force_refresh(&self) -> Result<Token> {
        self.refresh(true).await
    }

    /// Whether a token record exists.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Persistence`] if the store cannot be read.
    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.store.latest().await?.is_some())
    }

    /// Latest and previous records without their secrets.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Persistence`] if the store cannot be read.
    pub async fn status(&self) -> Result<TokenStatus> {
        let summarize = |t: Token| TokenSummary {
            id: t.id,
            created_at: t.created_at,
            expires_at: t.expires_at(),
            state: t.state(self.refresh_margin_secs),
        };
        let latest = self.store.latest().await?.map(summarize);
        let previous = self.store.previous().await?.map(summarize);
        Ok(TokenStatus {
            authenticated: latest.is_some(),
            records: self.store.count().await?,
            latest,
            previous,
        })
    }

    async fn refresh(&self, force: bool) -> Result<Token> {
        let flight = {
            let mut slot = self
                .in_flight
                .lock()
                .map_err(|_| GateError::Persistence("refresh guard poisoned".into()))?;
            if let Some(current) = &slot.current {
                tracing::debug!("joining in-flight token refresh");
                current.clone()
            } else {
                slot.generation += 1;
                let flight = self.spawn_refresh(slot.generation, force);
                slot.current = Some(flight.clone());
                flight
            }
        };
        flight.await
    }

    /// Start the refresh task. Must be called with the slot lock held, so the
    /// task cannot clear the slot before it has been filled.
    fn spawn_refresh(&self, generation: u64, force: bool) -> SharedRefresh {
        let store = Arc::clone(&self.store);
        let endpoint = Arc::clone(&self.endpoint);
        let slot = Arc::clone(&self.in_flight);
        let margin = self.refresh_margin_secs;

        let handle = tokio::spawn(async move {
            let result = refresh_once(store.as_ref(), endpoint.as_ref(), margin, force).await;
            if let Ok(mut slot) = slot.lock()
                && slot.generation == generation
            {
                slot.current = None;
            }
            result
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(GateError::UpstreamExchangeFailure {
                    status: None,
                    body: format!("refresh task did not complete: {e}"),
                })
            })
        }
        .boxed()
        .shared()
    }
}

async fn refresh_once(
    store: &dyn TokenStore,
    endpoint: &dyn TokenEndpoint,
    margin_secs: u64,
    force: bool,
) -> Result<Token> {
    // Re-read: a refresh that finished while this one was being scheduled
    // may already have written a fresh record.
    let current = store.latest().await?.ok_or(GateError::Unauthenticated)?;
    if !force && current.state(margin_secs) == TokenState::Fresh {
        return Ok(current);
    }

    let grant = endpoint
        .exchange(&GrantRequest::RefreshToken {
            refresh_token: current.refresh_token.clone(),
        })
        .await
        .inspect_err(|e| {
            if e.requires_reauthentication() {
                tracing::error!(error = %e, "refresh token rejected; re-run the authorization flow");
            } else {
                tracing::warn!(error = %e, retryable = e.is_retryable(), "token refresh failed");
            }
        })?;

    let rotated = grant.refresh_token.as_deref().is_some_and(|r| !r.is_empty());
    let fields = grant.into_fields(&current.refresh_token);
    let token = store.append(&fields).await.inspect_err(|e| {
        tracing::error!(error = %e, "refreshed token could not be persisted");
    })?;

    tracing::info!(
        id = token.id,
        previous_id = current.id,
        expires_in = token.expires_in,
        rotated,
        "access token refreshed"
    );
    Ok(token)
}
