//! Background deletion of expired sessions.
//!
//! The sweeper calls [`SessionStore::cleanup`] on a fixed interval. A failed sweep is logged
//! and the next tick runs as usual.

use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot},
    task::{AbortHandle, JoinHandle},
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info};

use crate::{Error, SessionStore};

type SweepRequest = oneshot::Sender<Result<u64, Error>>;

/// A recurring sweep of one store, not yet running.
pub struct Sweeper {
    store: SessionStore,
    period: Duration,
}

/// Handle to a running [`Sweeper`] task.
///
/// Dropping the handle detaches the task: it keeps sweeping on its interval until the
/// runtime shuts down. Use [`SweeperHandle::shutdown`] or [`SweeperHandle::abort_handle`]
/// to stop it.
pub struct SweeperHandle {
    requests: mpsc::Sender<SweepRequest>,
    task: JoinHandle<()>,
}

impl Sweeper {
    pub fn new(store: SessionStore, period: Duration) -> Self {
        Self { store, period }
    }

    /// Runs one sweep and logs its outcome.
    pub async fn sweep(&self) -> Result<u64, Error> {
        let result = self.store.cleanup().await;

        match &result {
            Ok(0) => debug!("session sweep: no expired sessions"),
            Ok(deleted) => info!(deleted, "session sweep completed"),
            Err(e) => error!(error = %e, source = ?e, "session sweep failed"),
        }

        result
    }

    /// Spawns the sweep loop on the current tokio runtime.
    ///
    /// The first sweep runs immediately, the following ones every `period`.
    pub fn spawn(self) -> SweeperHandle {
        let (requests, mut pending) = mpsc::channel::<SweepRequest>(8);

        let task: JoinHandle<()> = tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut accepting_requests = true;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = self.sweep().await;
                    }
                    request = pending.recv(), if accepting_requests => match request {
                        Some(reply) => {
                            let _ = reply.send(self.sweep().await);
                        }
                        None => {
                            debug!("session sweeper detached");
                            accepting_requests = false;
                        }
                    },
                }
            }
        });

        SweeperHandle { requests, task }
    }
}

impl SweeperHandle {
    /// Sweeps now, outside the regular schedule, and returns the number of deleted sessions.
    pub async fn sweep_now(&self) -> Result<u64, Error> {
        let (reply, result) = oneshot::channel();

        self.requests
            .send(reply)
            .await
            .map_err(|_| Error::SweeperStopped)?;

        result.await.map_err(|_| Error::SweeperStopped)?
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.task.abort_handle()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the task and waits for it to go away.
    pub async fn shutdown(self) {
        self.task.abort();

        match self.task.await {
            Ok(_) => (),
            Err(err) if err.is_cancelled() => debug!("session sweeper cleaned up."),
            Err(err) => error!("session sweeper failed to clean up: {:?}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use sessionkeep_config::StoreConfig;

    use super::*;
    use crate::{
        entities::session::SessionRecord,
        test_helpers::{age_session, memory_pool, memory_store},
    };

    const HOUR: Duration = Duration::from_secs(60 * 60);

    #[tokio::test]
    async fn sweep_now_deletes_expired_sessions() {
        let store = memory_store().await;
        let sweeper = Sweeper::new(store.clone(), HOUR).spawn();
        store.set("stale", &json!({ "user": "u1" }), None).await.unwrap();
        store.set("fresh", &json!({ "user": "u2" }), None).await.unwrap();
        age_session(store.pool(), "stale", HOUR).await;

        assert_eq!(sweeper.sweep_now().await.unwrap(), 1);
        assert_eq!(sweeper.sweep_now().await.unwrap(), 0);
        assert_eq!(SessionRecord::count("stale", store.pool()).await.unwrap(), 0);
        assert!(store.get::<Value>("fresh").await.unwrap().is_some());

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn ticks_sweep_on_the_interval() {
        let store = memory_store().await;
        store.set("stale", &json!({}), None).await.unwrap();
        age_session(store.pool(), "stale", HOUR).await;

        let sweeper = Sweeper::new(store.clone(), Duration::from_millis(20)).spawn();

        let mut remaining = 1;
        for _ in 0..100 {
            remaining = SessionRecord::count("stale", store.pool()).await.unwrap();
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(remaining, 0);

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn dropped_handle_keeps_sweeping() {
        let store = memory_store().await;
        store.ensure_schema().await.unwrap();
        drop(Sweeper::new(store.clone(), Duration::from_millis(20)).spawn());

        store.set("stale", &json!({}), None).await.unwrap();
        age_session(store.pool(), "stale", HOUR).await;

        let mut remaining = 1;
        for _ in 0..100 {
            remaining = SessionRecord::count("stale", store.pool()).await.unwrap();
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn failed_sweeps_do_not_stop_the_timer() {
        let pool = memory_pool().await;
        let store = SessionStore::new(pool.clone(), &StoreConfig::default());
        let sweeper = Sweeper::new(store.clone(), HOUR).spawn();
        store.ensure_schema().await.unwrap();

        // deleting from a view fails
        sqlx::query("DROP TABLE _mysql_session_store")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE VIEW _mysql_session_store AS SELECT 1 AS expires")
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            sweeper.sweep_now().await,
            Err(Error::StoreUnavailable(_))
        ));
        assert!(!sweeper.is_finished());

        sqlx::query("DROP VIEW _mysql_session_store")
            .execute(&pool)
            .await
            .unwrap();
        SessionRecord::create_table(&pool).await.unwrap();

        assert_eq!(sweeper.sweep_now().await.unwrap(), 0);

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn sweep_now_after_abort_reports_a_stopped_sweeper() {
        let store = memory_store().await;
        let sweeper = Sweeper::new(store, HOUR).spawn();

        sweeper.abort_handle().abort();
        while !sweeper.is_finished() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            sweeper.sweep_now().await,
            Err(Error::SweeperStopped)
        ));
    }

    #[tokio::test]
    async fn store_sweeper_uses_the_configured_interval() {
        let config = StoreConfig {
            clean_interval_ms: 1234,
            ..StoreConfig::default()
        };
        let store = SessionStore::new(memory_pool().await, &config);

        assert_eq!(store.sweeper().period, Duration::from_millis(1234));
    }
}
