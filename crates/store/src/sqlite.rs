//! SQLite-backed token log using sqlx.
//!
//! Schema: `tokens(id, access_token, refresh_token, expires_in, created_at)`.
//! Rows are only ever inserted. The latest record is the one with the greatest
//! `created_at`, ties broken by `id` (insertion order).

use async_trait::async_trait;
use crmgate_types::{GateError, Token, TokenFields, TokenStore, traits::Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;

type TokenRow = (i64, String, String, i64, i64);

const SELECT_BY_RECENCY: &str = "SELECT id, access_token, refresh_token, expires_in, created_at
     FROM tokens ORDER BY created_at DESC, id DESC LIMIT 1 OFFSET ?";

/// A persistent [`TokenStore`] backed by `SQLite`.
pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    /// Connects to a `SQLite` database (e.g. `"sqlite:./tokens.db"` or `"sqlite::memory:"`).
    ///
    /// Automatically creates the database file if it does not exist and runs
    /// the schema migration.
    ///
    /// # Errors
    ///
    /// Returns a [`sqlx::Error`] if the connection or table creation fails.
    pub async fn new(database_url: &str) -> std::result::Result<Self, sqlx::Error> {
        let opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `:memory:` is a separate database.
        let pool_opts = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_opts.connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tokens (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                access_token  TEXT    NOT NULL,
                refresh_token TEXT    NOT NULL CHECK (refresh_token <> ''),
                expires_in    INTEGER NOT NULL,
                created_at    INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tokens_recency ON tokens(created_at DESC, id DESC)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn nth_most_recent(&self, offset: i64) -> Result<Option<Token>> {
        let row: Option<TokenRow> = sqlx::query_as(SELECT_BY_RECENCY)
            .bind(offset)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_token).transpose()
    }
}

fn to_i64(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| GateError::Persistence(format!("{what} out of range: {value}")))
}

fn to_u64(value: i64, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| GateError::Persistence(format!("corrupt {what}: {value}")))
}

fn row_to_token((id, access_token, refresh_token, expires_in, created_at): TokenRow) -> Result<Token> {
    Ok(Token {
        id,
        access_token,
        refresh_token,
        expires_in: to_u64(expires_in, "expires_in")?,
        created_at: to_u64(created_at, "created_at")?,
    })
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn append_at(&self, fields: &TokenFields, created_at: u64) -> Result<Token> {
        if fields.refresh_token.is_empty() {
            return Err(GateError::Persistence(
                "refusing to persist a token without a refresh token".into(),
            ));
        }

        // Clamp inside the INSERT so the read and the write are one statement.
        let (id, stamped): (i64, i64) = sqlx::query_as(
            "INSERT INTO tokens (access_token, refresh_token, expires_in, created_at)
             VALUES (?, ?, ?, MAX(?, COALESCE((SELECT MAX(created_at) FROM tokens), 0)))
             RETURNING id, created_at",
        )
        .bind(&fields.access_token)
        .bind(&fields.refresh_token)
        .bind(to_i64(fields.expires_in, "expires_in")?)
        .bind(to_i64(created_at, "created_at")?)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id, created_at = stamped, "token record appended");

        Ok(Token {
            id,
            access_token: fields.access_token.clone(),
            refresh_token: fields.refresh_token.clone(),
            expires_in: fields.expires_in,
            created_at: to_u64(stamped, "created_at")?,
        })
    }

    async fn latest(&self) -> Result<Option<Token>> {
        self.nth_most_recent(0).await
    }

    async fn previous(&self) -> Result<Option<Token>> {
        self.nth_most_recent(1).await
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tokens")
            .fetch_one(&self.pool)
            .await?;
        to_u64(n, "row count")
    }
}
