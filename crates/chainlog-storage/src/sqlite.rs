//! SQLite checkpoint store.
//!
//! Persists one `(block_number, log_index)` record per signature in a single
//! SQLite file, so reconciliation survives process restarts. Uses `sqlx` with
//! WAL mode so the processor can read while a consumer writes.
//!
//! # Usage
//! ```rust,no_run
//! use chainlog_storage::sqlite::SqliteCheckpointStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteCheckpointStore::open("./checkpoints.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteCheckpointStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use chainlog_core::checkpoint::{CheckpointRecord, CheckpointStore, CheckpointWriter};
use chainlog_core::error::CheckpointError;
use chainlog_core::types::Signature;

fn storage_err(e: sqlx::Error) -> CheckpointError {
    CheckpointError::Storage(e.to_string())
}

/// SQLite-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./checkpoints.db"`) or a full
    /// SQLite URL (`"sqlite:./checkpoints.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, CheckpointError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// All data is lost when the pool is dropped. Ideal for tests.
    pub async fn in_memory() -> Result<Self, CheckpointError> {
        // A single connection: every `:memory:` connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), CheckpointError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS log_checkpoints (
                signature    TEXT    NOT NULL PRIMARY KEY,
                block_number INTEGER NOT NULL,
                log_index    INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    /// Unix timestamp of the last save for `signature`, if any.
    pub async fn updated_at(&self, signature: &Signature) -> Result<Option<i64>, CheckpointError> {
        let row = sqlx::query("SELECT updated_at FROM log_checkpoints WHERE signature = ?")
            .bind(signature.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(|r| r.get::<i64, _>("updated_at")))
    }
}

fn to_column(signature: &Signature, value: u64, what: &str) -> Result<i64, CheckpointError> {
    i64::try_from(value).map_err(|_| CheckpointError::Corrupt {
        signature: *signature,
        reason: format!("{what} {value} exceeds i64"),
    })
}

fn from_column(signature: &Signature, value: i64, what: &str) -> Result<u64, CheckpointError> {
    u64::try_from(value).map_err(|_| CheckpointError::Corrupt {
        signature: *signature,
        reason: format!("negative {what} {value}"),
    })
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn record(&self, signature: &Signature) -> Result<CheckpointRecord, CheckpointError> {
        let row = sqlx::query(
            "SELECT block_number, log_index FROM log_checkpoints WHERE signature = ?",
        )
        .bind(signature.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        let Some(row) = row else {
            return Ok(CheckpointRecord::default());
        };
        Ok(CheckpointRecord {
            block_number: from_column(signature, row.get("block_number"), "block_number")?,
            log_index: from_column(signature, row.get("log_index"), "log_index")?,
        })
    }
}

#[async_trait]
impl CheckpointWriter for SqliteCheckpointStore {
    async fn save(
        &self,
        signature: &Signature,
        record: CheckpointRecord,
    ) -> Result<(), CheckpointError> {
        let block_number = to_column(signature, record.block_number, "block_number")?;
        let log_index = to_column(signature, record.log_index, "log_index")?;

        sqlx::query(
            "INSERT INTO log_checkpoints (signature, block_number, log_index, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (signature) DO UPDATE SET
                 block_number = excluded.block_number,
                 log_index    = excluded.log_index,
                 updated_at   = excluded.updated_at",
        )
        .bind(signature.to_string())
        .bind(block_number)
        .bind(log_index)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(
            %signature,
            block = record.block_number,
            index = record.log_index,
            "checkpoint saved"
        );
        Ok(())
    }

    async fn delete(&self, signature: &Signature) -> Result<(), CheckpointError> {
        sqlx::query("DELETE FROM log_checkpoints WHERE signature = ?")
            .bind(signature.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
