use sqlx::{Sqlite, prelude::FromRow};
use validator::Validate;

use crate::Error;

/// Name of the table holding the sessions.
pub const TABLE: &str = "_mysql_session_store";

const CREATE_STATEMENT: &str = r#"
CREATE TABLE IF NOT EXISTS _mysql_session_store (
    id VARCHAR(255) NOT NULL PRIMARY KEY,
    expires BIGINT NULL,
    data TEXT NULL
);
CREATE INDEX IF NOT EXISTS _mysql_session_store__expires ON _mysql_session_store (expires);
"#;

/// A stored session.
#[derive(Clone, FromRow, Debug, PartialEq)]
pub struct SessionRecord {
    /// The session id handed out by the session middleware.
    pub id: String,
    /// Expiry instant in epoch milliseconds. A row without one is never returned by
    /// [`SessionRecord::load_unexpired`] and never swept.
    pub expires: Option<i64>,
    /// The JSON encoded session payload.
    pub data: Option<String>,
}

/// Checks a session id before it is used as a key.
#[derive(Validate)]
pub struct SessionKey<'a> {
    /// Ids must fit the `VARCHAR(255)` primary key.
    #[validate(length(min = 1, max = 255, message = "Session id must be 1 to 255 characters long"))]
    pub id: &'a str,
}

impl<'a> SessionKey<'a> {
    pub fn parse(id: &'a str) -> Result<Self, Error> {
        let key = Self { id };
        key.validate()?;
        Ok(key)
    }
}

impl SessionRecord {
    /// Creates the session table and its expiry index unless they already exist.
    pub async fn create_table(
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<(), Error> {
        executor.execute(CREATE_STATEMENT).await?;

        Ok(())
    }

    /// Loads the session with the given id if it expires after `now_ms`.
    pub async fn load_unexpired(
        id: &str,
        now_ms: i64,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<Option<SessionRecord>, Error> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r#"SELECT id, expires, data FROM _mysql_session_store WHERE id = ? AND expires > ?"#,
        )
        .bind(id)
        .bind(now_ms)
        .fetch_optional(executor)
        .await?;

        Ok(record)
    }

    /// Loads the session with the given id whether or not it has expired.
    pub async fn load(
        id: &str,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<Option<SessionRecord>, Error> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r#"SELECT id, expires, data FROM _mysql_session_store WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(record)
    }

    /// Inserts the session, or overwrites `expires` and `data` of the existing row with the
    /// same id. The statement is atomic per row; concurrent writers are last-write-wins.
    pub async fn upsert(
        id: &str,
        expires: i64,
        data: &str,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"INSERT INTO _mysql_session_store (id, expires, data) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET expires = excluded.expires, data = excluded.data"#,
        )
        .bind(id)
        .bind(expires)
        .bind(data)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Deletes the session with the given id and returns the number of deleted rows.
    pub async fn delete(
        id: &str,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<u64, Error> {
        let result = sqlx::query(r#"DELETE FROM _mysql_session_store WHERE id = ?"#)
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes every session that expired before `now_ms`.
    pub async fn delete_expired(
        now_ms: i64,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<u64, Error> {
        let result = sqlx::query(r#"DELETE FROM _mysql_session_store WHERE expires < ?"#)
            .bind(now_ms)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Counts the rows stored for an id, expired or not.
    pub async fn count(
        id: &str,
        executor: impl sqlx::Executor<'_, Database = Sqlite>,
    ) -> Result<i64, Error> {
        let count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM _mysql_session_store WHERE id = ?"#)
                .bind(id)
                .fetch_one(executor)
                .await?;

        Ok(count)
    }
}
