use std::future::Future;

use color_eyre::eyre::Context as _;
use serde_json::Value;
use sessionkeep_config::DatabaseConfig;
use sessionkeep_db::{SessionStore, create_database_if_not_exists};

use crate::{Error, util::ui::UI};

/// Creates the database if it is missing, then the session table.
pub async fn create(
    ui: &mut UI<'_>,
    config: &DatabaseConfig,
    store: &SessionStore,
) -> Result<(), Error> {
    create_database_if_not_exists(config)
        .await
        .context("Could not create the database!")?;
    ui.log(&format!("Database {} is present.", config.url));

    store
        .ensure_schema()
        .await
        .context("Could not create the session table!")?;

    Ok(())
}

/// Runs a single sweep and returns the number of deleted sessions.
pub async fn sweep(store: &SessionStore) -> Result<u64, Error> {
    let deleted = store
        .cleanup()
        .await
        .context("Could not delete expired sessions!")?;

    Ok(deleted)
}

/// Prints the live session stored under `id` as pretty JSON.
///
/// Returns whether a session was found.
pub async fn show(ui: &mut UI<'_>, store: &SessionStore, id: &str) -> Result<bool, Error> {
    let session: Option<Value> = store
        .get(id)
        .await
        .with_context(|| format!("Could not load session {}!", id))?;

    match session {
        Some(session) => {
            ui.output(&serde_json::to_string_pretty(&session)?);
            Ok(true)
        }
        None => Ok(false),
    }
}

pub async fn destroy(store: &SessionStore, id: &str) -> Result<(), Error> {
    store
        .destroy(id)
        .await
        .with_context(|| format!("Could not destroy session {}!", id))?;

    Ok(())
}

/// Runs the expiry sweeper until `shutdown` resolves.
pub async fn watch<F>(ui: &mut UI<'_>, store: &SessionStore, shutdown: F) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    store
        .ensure_schema()
        .await
        .context("Could not create the session table!")?;

    let sweeper = store.sweeper().spawn();
    ui.log(&format!(
        "Sweeping every {} seconds.",
        store.clean_interval().as_secs()
    ));

    shutdown.await;
    sweeper.shutdown().await;

    Ok(())
}
