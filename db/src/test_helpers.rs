//! Helpers for tests that need a session database.
//!
//! Enabled for this crate's own tests and for dependents through the `test-helpers` feature.

use std::time::Duration;

use sessionkeep_config::StoreConfig;
use sqlx::sqlite::SqlitePoolOptions;

use crate::{DbPool, SessionStore};

/// A pool over a private in-memory database.
///
/// Every connection to `sqlite::memory:` opens its own database, so the pool is pinned to a
/// single connection that is never recycled.
pub async fn memory_pool() -> DbPool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory sqlite database")
}

/// A store over [`memory_pool`] with default settings.
pub async fn memory_store() -> SessionStore {
    SessionStore::new(memory_pool().await, &StoreConfig::default())
}

/// Moves the expiry of a stored session `by` into the past.
pub async fn age_session(pool: &DbPool, id: &str, by: Duration) {
    let by = i64::try_from(by.as_millis()).expect("age does not fit in i64 milliseconds");

    sqlx::query("UPDATE _mysql_session_store SET expires = expires - ? WHERE id = ?")
        .bind(by)
        .bind(id)
        .execute(pool)
        .await
        .expect("failed to age session");
}
