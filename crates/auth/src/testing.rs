//! Scripted fakes shared by this crate's unit tests.

use async_trait::async_trait;
use crmgate_types::{
    GateError, GrantRequest, Token, TokenEndpoint, TokenFields, TokenGrant, TokenStore,
    traits::Result,
};
use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Replays queued responses and records every request it receives.
#[derive(Default)]
pub struct ScriptedEndpoint {
    responses: Mutex<VecDeque<Result<TokenGrant>>>,
    requests: Mutex<Vec<GrantRequest>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every exchange for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn push(&self, response: Result<TokenGrant>) -> &Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn push_grant(&self, access: &str, refresh: Option<&str>, expires_in: u64) -> &Self {
        self.push(Ok(TokenGrant {
            access_token: access.into(),
            refresh_token: refresh.map(Into::into),
            expires_in,
        }))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GrantRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenEndpoint for ScriptedEndpoint {
    async fn exchange(&self, request: &GrantRequest) -> Result<TokenGrant> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(GateError::UpstreamExchangeFailure {
                    status: None,
                    body: "no scripted response".into(),
                })
            })
    }
}

/// Wraps a store and fails every append.
pub struct ReadOnlyStore<S>(pub S);

#[async_trait]
impl<S: TokenStore> TokenStore for ReadOnlyStore<S> {
    async fn append_at(&self, _fields: &TokenFields, _created_at: u64) -> Result<Token> {
        Err(GateError::Persistence("disk is read-only".into()))
    }

    async fn latest(&self) -> Result<Option<Token>> {
        self.0.latest().await
    }

    async fn previous(&self) -> Result<Option<Token>> {
        self.0.previous().await
    }

    async fn count(&self) -> Result<u64> {
        self.0.count().await
    }
}

/// A store whose backend is gone: every call fails.
pub struct UnavailableStore;

#[async_trait]
impl TokenStore for UnavailableStore {
    async fn append_at(&self, _fields: &TokenFields, _created_at: u64) -> Result<Token> {
        Err(GateError::Persistence("database unavailable".into()))
    }

    async fn latest(&self) -> Result<Option<Token>> {
        Err(GateError::Persistence("database unavailable".into()))
    }

    async fn previous(&self) -> Result<Option<Token>> {
        Err(GateError::Persistence("database unavailable".into()))
    }

    async fn count(&self) -> Result<u64> {
        Err(GateError::Persistence("database unavailable".into()))
    }
}
