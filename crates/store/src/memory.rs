//! In-memory token log backed by a `Vec` behind a `Mutex`.

use async_trait::async_trait;
use crmgate_types::{GateError, Token, TokenFields, TokenStore, traits::Result};
use std::sync::{Mutex, MutexGuard};

/// An in-memory [`TokenStore`] implementation for testing and ephemeral use.
///
/// Records are kept in insertion order, so the last element is always the
/// latest record.
#[derive(Default)]
pub struct InMemoryTokenStore {
    records: Mutex<Vec<Token>>,
}

impl InMemoryTokenStore {
    /// Creates a new empty in-memory token store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, Vec<Token>>> {
        self.records
            .lock()
            .map_err(|_| GateError::Persistence("token log mutex poisoned".into()))
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn append_at(&self, fields: &TokenFields, created_at: u64) -> Result<Token> {
        if fields.refresh_token.is_empty() {
            return Err(GateError::Persistence(
                "refusing to persist a token without a refresh token".into(),
            ));
        }
        let mut records = self.records()?;
        let (id, floor) = records
            .last()
            .map_or((1, 0), |last| (last.id + 1, last.created_at));
        let token = Token {
            id,
            access_token: fields.access_token.clone(),
            refresh_token: fields.refresh_token.clone(),
            expires_in: fields.expires_in,
            created_at: created_at.max(floor),
        };
        records.push(token.clone());
        Ok(token)
    }

    async fn latest(&self) -> Result<Option<Token>> {
        Ok(self.records()?.last().cloned())
    }

    async fn previous(&self) -> Result<Option<Token>> {
        let records = self.records()?;
        Ok(records.len().checked_sub(2).map(|i| records[i].clone()))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records()?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(access: &str, refresh: &str) -> TokenFields {
        TokenFields {
            access_token: access.into(),
            refresh_token: refresh.into(),
            expires_in: 3600,
        }
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = InMemoryTokenStore::new();
        assert!(store.latest().await.unwrap().is_none());
        assert!(store.previous().await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_append_and_latest() {
        let store = InMemoryTokenStore::new();
        let written = store.append(&fields("A", "B")).await.unwrap();
        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest, written);
        assert_eq!(latest.fields(), fields("A", "B"));
    }

    #[tokio::test]
    async fn test_previous_is_second_most_recent() {
        let store = InMemoryTokenStore::new();
        store.append(&fields("first", "r")).await.unwrap();
        assert!(store.previous().await.unwrap().is_none());
        store.append(&fields("second", "r")).await.unwrap();
        store.append(&fields("third", "r")).await.unwrap();
        assert_eq!(store.previous().await.unwrap().unwrap().access_token, "second");
        assert_eq!(store.latest().await.unwrap().unwrap().access_token, "third");
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_created_at_never_goes_backwards() {
        let store = InMemoryTokenStore::new();
        store.append_at(&fields("a", "r"), 2_000).await.unwrap();
        let second = store.append_at(&fields("b", "r"), 1_000).await.unwrap();
        assert_eq!(second.created_at, 2_000);
        assert_eq!(store.latest().await.unwrap().unwrap().access_token, "b");
    }

    #[tokio::test]
    async fn test_ties_broken_by_insertion_order() {
        let store = InMemoryTokenStore::new();
        store.append_at(&fields("a", "r"), 5_000).await.unwrap();
        store.append_at(&fields("b", "r"), 5_000).await.unwrap();
        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.access_token, "b");
        assert_eq!(latest.id, 2);
    }

    #[tokio::test]
    async fn test_rejects_empty_refresh_token() {
        let store = InMemoryTokenStore::new();
        let err = store.append(&fields("a", "")).await.unwrap_err();
        assert!(matches!(err, GateError::Persistence(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
