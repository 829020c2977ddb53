//! Storage layer abstraction and implementations.
//!
//! This module defines the interface for persisting and retrieving paper
//! metadata discovered by topic searches. Records are partitioned by
//! normalized topic; every search merges its results into the topic's
//! partition and rewrites it in full.

pub mod json;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{PaperRecord, TopicSummary};

/// Errors that can occur during storage operations.
///
/// A corrupt partition is not an error: readers recover it as an empty
/// partition. These variants cover failures with no safe fallback.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem access failed
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A partition could not be serialized for writing
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The topic normalizes to an unusable partition name
    #[error("Invalid topic: {0:?}")]
    InvalidTopic(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for paper metadata stores.
///
/// Implementations must make each partition's load-merge-write atomic with
/// respect to other writers of the same partition in this process.
#[async_trait]
pub trait PaperStore: Send + Sync {
    /// Merge search results into the topic's partition.
    ///
    /// Loads the partition (missing or unparsable means empty), inserts or
    /// overwrites each record by id, and writes the whole partition back.
    ///
    /// # Returns
    /// The ids of `records`, in the order given, whether new or already present
    async fn upsert_from_search(
        &self,
        topic: &str,
        records: &[PaperRecord],
    ) -> StorageResult<Vec<String>>;

    /// Find a paper by id across every partition.
    ///
    /// Stops at the first partition containing the id. Unreadable partitions
    /// are skipped. `None` means no partition knows the paper.
    async fn lookup(&self, paper_id: &str) -> StorageResult<Option<PaperRecord>>;

    /// List known partitions with their record counts.
    async fn topics(&self) -> StorageResult<Vec<TopicSummary>>;
}
