//! chainlog-storage — checkpoint store backends for ChainLog.
//!
//! Backends:
//! - `memory`: in-memory (dev/testing, no persistence, default feature `memory`)
//! - `sqlite`: SQLite via `sqlx` (single-file persistence, feature `sqlite`)
//!
//! Every backend implements both [`CheckpointStore`](chainlog_core::CheckpointStore)
//! (read by the processor) and [`CheckpointWriter`](chainlog_core::CheckpointWriter)
//! (written by downstream consumers).

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "memory")]
pub use memory::InMemoryCheckpointStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;
