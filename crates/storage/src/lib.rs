//! Local durable queue of document writes that the remote store has not
//! acknowledged yet.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub document_id: String,
    pub collection: String,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every in-memory connection is its own database.
        let max_connections = if is_in_memory(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Persists a write before its first delivery attempt. Enqueuing the same
    /// document twice keeps the original entry.
    pub async fn enqueue_write(
        &self,
        collection: &str,
        document_id: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let payload = serde_json::to_string(payload).context("failed to encode pending write")?;
        sqlx::query(
            "INSERT INTO pending_writes (document_id, collection, payload, enqueued_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(document_id) DO NOTHING",
        )
        .bind(document_id)
        .bind(collection)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to enqueue write for document '{document_id}'"))?;
        Ok(())
    }

    pub async fn pending_writes(&self) -> Result<Vec<PendingWrite>> {
        let rows = sqlx::query(
            "SELECT document_id, collection, payload, attempts, last_error, enqueued_at
             FROM pending_writes
             ORDER BY enqueued_at ASC, document_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<PendingWrite> {
                let payload: String = row.try_get("payload")?;
                let enqueued_at: String = row.try_get("enqueued_at")?;
                Ok(PendingWrite {
                    document_id: row.try_get("document_id")?,
                    collection: row.try_get("collection")?,
                    payload: serde_json::from_str(&payload)
                        .context("corrupt pending write payload")?,
                    attempts: row.try_get::<i64, _>("attempts")?.try_into().unwrap_or(u32::MAX),
                    last_error: row.try_get("last_error")?,
                    enqueued_at: DateTime::parse_from_rfc3339(&enqueued_at)
                        .context("corrupt pending write timestamp")?
                        .with_timezone(&Utc),
                })
            })
            .collect()
    }

    pub async fn pending_write_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM pending_writes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn record_failed_attempt(&self, document_id: &str, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE pending_writes SET attempts = attempts + 1, last_error = ? WHERE document_id = ?",
        )
        .bind(error)
        .bind(document_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drops a write once the remote store has accepted or rejected it.
    /// Returns whether an entry was removed.
    pub async fn remove_write(&self, document_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pending_writes WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_in_memory(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
