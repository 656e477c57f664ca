//! Resume capability for ingestion runs
//!
//! Provides the persisted checkpoint with atomic writes and the advisory run lock.

pub mod checkpoint;
pub mod lock;
pub mod store;

pub use checkpoint::IngestionCheckpoint;
pub use lock::{RunLock, RunLockGuard};
pub use store::{CheckpointError, CheckpointStore};
