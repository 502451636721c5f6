use std::{sync::Arc, time::Duration};

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use sessionkeep_config::{Config, StoreConfig};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    DbPool, Error, connect_pool,
    entities::session::{SessionKey, SessionRecord},
    expiry::expires_on,
    sweeper::{Sweeper, SweeperHandle},
};

/// ------------------------------------------------------------------------
/// # A session store backed by a single SQL table
/// ------------------------------------------------------------------------
///
/// Every operation is one round-trip on a connection borrowed from the pool and
/// released when the query finishes, failed or not. There is no in-process locking:
/// concurrent writes to the same id are resolved by the upsert, last write wins.
///
/// The table is created on first use. Clones share the pool and the schema state.
///
/// # Example
///
/// ```rust
/// let store = SessionStore::connect(&config)?;
/// store.set("abc", &json!({ "user": "u1" }), Some(Duration::from_secs(1))).await?;
/// let session: Option<Value> = store.get("abc").await?;
/// ```
/// ------------------------------------------------------------------------
#[derive(Clone, Debug)]
pub struct SessionStore {
    pool: DbPool,
    default_ttl: Duration,
    clean_interval: Duration,
    schema: Arc<OnceCell<()>>,
}

impl SessionStore {
    /// Wraps an existing pool. Does no I/O.
    pub fn new(pool: DbPool, config: &StoreConfig) -> Self {
        Self {
            pool,
            default_ttl: config.default_ttl(),
            clean_interval: config.clean_interval(),
            schema: Arc::new(OnceCell::new()),
        }
    }

    /// Builds a lazily connected pool from the database settings and wraps it.
    pub fn connect(config: &Config) -> Result<Self, Error> {
        let pool = connect_pool(&config.database)?;

        Ok(Self::new(pool, &config.store))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn clean_interval(&self) -> Duration {
        self.clean_interval
    }

    /// Creates the session table unless this store already did. A failed attempt is retried
    /// by the next call.
    pub async fn ensure_schema(&self) -> Result<(), Error> {
        self.schema
            .get_or_try_init(|| async {
                SessionRecord::create_table(&self.pool).await?;
                debug!("session table ready");
                Ok::<_, Error>(())
            })
            .await?;

        Ok(())
    }

    /// Loads the live session stored under `id`.
    ///
    /// Returns `None` when there is no row, when it has expired or when it holds no data.
    pub async fn get<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        let key = SessionKey::parse(id)?;
        self.ensure_schema().await?;

        let now = Utc::now().timestamp_millis();
        let record = SessionRecord::load_unexpired(key.id, now, &self.pool).await?;
        debug!(session_id = key.id, found = record.is_some(), "loaded session");

        record
            .and_then(|record| record.data)
            .map(|data| serde_json::from_str(&data))
            .transpose()
            .map_err(Error::MalformedData)
    }

    /// Stores `session` under `id`, replacing any previous session with that id.
    ///
    /// The expiry comes from the session's `cookie.expires` field when it has one, and is
    /// `now + ttl` otherwise.
    pub async fn set<T>(&self, id: &str, session: &T, ttl: Option<Duration>) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        let key = SessionKey::parse(id)?;
        let payload = serde_json::to_value(session).map_err(Error::Serialization)?;
        let expires = expires_on(&payload, ttl, self.default_ttl, Utc::now())?;
        self.ensure_schema().await?;

        SessionRecord::upsert(
            key.id,
            expires.timestamp_millis(),
            &payload.to_string(),
            &self.pool,
        )
        .await?;
        debug!(session_id = key.id, %expires, "stored session");

        Ok(())
    }

    /// Deletes the session stored under `id`. Deleting a missing session succeeds.
    pub async fn destroy(&self, id: &str) -> Result<(), Error> {
        let key = SessionKey::parse(id)?;
        self.ensure_schema().await?;

        let deleted = SessionRecord::delete(key.id, &self.pool).await?;
        debug!(session_id = key.id, deleted, "destroyed session");

        Ok(())
    }

    /// Deletes every expired session and returns how many were removed.
    pub async fn cleanup(&self) -> Result<u64, Error> {
        self.ensure_schema().await?;

        let now = Utc::now().timestamp_millis();
        let deleted = SessionRecord::delete_expired(now, &self.pool).await?;

        Ok(deleted)
    }

    /// A sweeper for this store running at the configured interval.
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(self.clone(), self.clean_interval)
    }
}

/// ------------------------------------------------------------------------
/// Connects a store and starts its expiry sweeper.
/// ------------------------------------------------------------------------
/// # Returns
///
/// The store to hand to the session middleware and the handle of the sweeper task,
/// which the caller aborts on shutdown.
///
/// ------------------------------------------------------------------------
pub struct SessionStoreInitializer {
    pub store: SessionStore,
    pub sweeper: SweeperHandle,
}

impl SessionStoreInitializer {
    /// Must be called from within a tokio runtime.
    pub async fn init(config: &Config) -> Result<Self, Error> {
        let store = SessionStore::connect(config)?;
        store.ensure_schema().await?;

        let sweeper = store.sweeper().spawn();

        Ok(Self { store, sweeper })
    }
}
