use sessionkeep_config::DatabaseConfig;
use sqlx::migrate::MigrateDatabase as _;
use sqlx::{Sqlite, sqlite::SqlitePoolOptions};

pub use serde::{Serialize, de::DeserializeOwned};
pub use sqlx::SqlitePool as DbPool;

/// Entity definitions and related general queries.
pub mod entities;
/// The expiry policy applied when a session is written.
pub mod expiry;
pub mod store;
pub mod sweeper;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use store::{SessionStore, SessionStoreInitializer};
pub use sweeper::{Sweeper, SweeperHandle};

/// Creates a connection pool to the database specified in the passed [`DatabaseConfig`].
///
/// The pool is lazy: no connection is opened until the first query borrows one, so building
/// a store never blocks on the database being reachable.
pub fn connect_pool(config: &DatabaseConfig) -> Result<DbPool, Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_lazy(&config.url)?;

    Ok(pool)
}

/// Create a database if it does not exist.
/// Used where the session database is created at runtime, e.g. the `sessions create` command.
pub async fn create_database_if_not_exists(config: &DatabaseConfig) -> Result<(), Error> {
    if !Sqlite::database_exists(&config.url).await? {
        Sqlite::create_database(&config.url).await?
    };
    Ok(())
}

/// Errors that can occur as a result of a session store operation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Connecting to the database or running a query failed. Every operation can return this;
    /// nothing is retried.
    #[error("session store unavailable")]
    StoreUnavailable(#[from] sqlx::Error),
    /// A stored session payload is not valid JSON for the requested type.
    #[error("malformed session data")]
    MalformedData(#[source] serde_json::Error),
    /// The session could not be encoded as JSON.
    #[error("session could not be serialized")]
    Serialization(#[source] serde_json::Error),
    /// The session's `cookie.expires` hint is not a usable instant.
    #[error("invalid session expiry: {0}")]
    InvalidExpiry(String),
    /// The session id does not fit the `id` column.
    #[error("validation failed")]
    ValidationError(#[from] validator::ValidationErrors),
    /// The sweeper task has been shut down or has panicked.
    #[error("sweeper is not running")]
    SweeperStopped,
}
