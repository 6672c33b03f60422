//! Token storage backends for the append-only OAuth token log.
//!
//! Provides an in-memory store for testing and a SQLite-backed store for production.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryTokenStore;
pub use sqlite::SqliteTokenStore;
