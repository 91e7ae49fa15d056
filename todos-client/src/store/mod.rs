//! Store abstraction.
//!
//! The dispatcher talks to the syncing key-value store through the
//! [`KvStore`] and [`Batch`] traits, which allows swapping the backing
//! store (in-memory for tests, a networked or embedded store in
//! production).
//!
//! Semantics every implementation must honor:
//! - Keys are ordered lexicographically; scans yield ascending key order.
//! - Concurrent writes to one key resolve last-writer-wins.
//! - A batch's writes become visible atomically on commit, or not at all.

mod mem;

pub use mem::MemStore;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No value under the key.
    #[error("no value for key {key}")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// The target already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A batch read was invalidated by a concurrent write before commit.
    #[error("concurrent write to {key}")]
    Conflict {
        /// The key written concurrently.
        key: String,
    },

    /// Operation on a batch that was already committed or aborted.
    #[error("batch already closed")]
    BatchClosed,

    /// The store does not provide this capability.
    #[error("unsupported by this store: {0}")]
    Unsupported(&'static str),

    /// The store gave up waiting.
    #[error("store operation timed out")]
    Timeout,
}

/// One row of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// Row key.
    pub key: String,
    /// Raw row value.
    pub value: Vec<u8>,
}

/// Position in a store's change log. Watching from a marker yields every
/// change committed after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ResumeMarker(pub u64);

/// One key change observed on a watch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchChange {
    /// Changed key.
    pub key: String,
    /// New value, or `None` if the key was deleted.
    pub value: Option<Vec<u8>>,
    /// `true` if the write was made by another device and arrived via sync.
    pub from_sync: bool,
}

/// Changes committed together, in commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchBatch {
    /// Changes under the watched prefix.
    pub changes: Vec<WatchChange>,
    /// Marker to resume after this batch.
    pub resume_marker: ResumeMarker,
}

impl WatchBatch {
    /// True if any change in the batch came from sync.
    pub fn from_sync(&self) -> bool {
        self.changes.iter().any(|c| c.from_sync)
    }
}

/// Stream of scanned rows, ascending by key.
pub type ScanStream = BoxStream<'static, Result<KeyValue, StoreError>>;

/// Stream of committed change batches.
pub type WatchStream = BoxStream<'static, Result<WatchBatch, StoreError>>;

/// Key predicate for [`KvStore::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    /// Every key.
    All,
    /// Keys starting with the prefix.
    Prefix(String),
    /// Keys that do not contain the character.
    Excludes(char),
}

impl KeyFilter {
    /// Check a key against the filter.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyFilter::All => true,
            KeyFilter::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyFilter::Excludes(c) => !key.contains(*c),
        }
    }
}

/// Ordered key-value store with batches and, optionally, a change stream.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read one key. Absent keys fail with [`StoreError::NotFound`].
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Write one key.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Delete one key. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Scan rows whose key starts with `prefix`, ascending.
    ///
    /// The empty prefix scans everything. Callers must consume the stream
    /// to completion or propagate its first error.
    async fn scan(&self, prefix: &str) -> Result<ScanStream, StoreError>;

    /// Rows matching a key filter, ascending.
    ///
    /// The default implementation filters a full scan.
    async fn query(&self, filter: KeyFilter) -> Result<ScanStream, StoreError> {
        let prefix = match &filter {
            KeyFilter::Prefix(prefix) => prefix.clone(),
            _ => String::new(),
        };
        let rows = self.scan(&prefix).await?;
        Ok(rows
            .try_filter(move |row| futures::future::ready(filter.matches(&row.key)))
            .boxed())
    }

    /// Begin an atomic batch.
    async fn begin_batch(&self) -> Result<Arc<dyn Batch>, StoreError>;

    /// Whether [`KvStore::watch`] is available.
    fn supports_watch(&self) -> bool {
        false
    }

    /// Marker for "now". Watching from it yields only future changes.
    async fn resume_marker(&self) -> Result<ResumeMarker, StoreError> {
        Err(StoreError::Unsupported("watch"))
    }

    /// Stream committed changes under `prefix` after `from`.
    async fn watch(&self, prefix: &str, from: ResumeMarker) -> Result<WatchStream, StoreError> {
        let _ = (prefix, from);
        Err(StoreError::Unsupported("watch"))
    }
}

/// An atomic unit of reads and writes.
///
/// Reads see the batch's own pending writes. Commit applies every write or
/// none; it fails with [`StoreError::Conflict`] if a key read inside the
/// batch was written by someone else in the meantime.
#[async_trait]
pub trait Batch: Send + Sync {
    /// Read one key as of this batch.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Stage a write.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Stage a delete.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Apply all staged writes.
    async fn commit(&self) -> Result<(), StoreError>;

    /// Discard all staged writes.
    async fn abort(&self);
}

/// Attempts `run_in_batch` makes before giving up on conflicts.
pub const BATCH_ATTEMPTS: usize = 3;

/// Run `f` inside a batch: commit if it succeeds, abort if it fails.
///
/// A commit that loses a race ([`StoreError::Conflict`]) reruns `f` in a
/// fresh batch, up to [`BATCH_ATTEMPTS`] times, so it sees the other
/// writer's result.
pub async fn run_in_batch<S, F, Fut, T, E>(store: &S, mut f: F) -> Result<T, E>
where
    S: KvStore + ?Sized,
    F: FnMut(Arc<dyn Batch>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<StoreError>,
{
    let mut attempt = 1;
    loop {
        let batch = store.begin_batch().await?;
        match f(Arc::clone(&batch)).await {
            Ok(value) => match batch.commit().await {
                Ok(()) => return Ok(value),
                Err(StoreError::Conflict { key }) if attempt < BATCH_ATTEMPTS => {
                    tracing::debug!(key = %key, attempt, "batch conflict; retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            },
            Err(e) => {
                batch.abort().await;
                return Err(e);
            }
        }
    }
}

/// Drain a scan into memory, stopping at the first error.
pub async fn collect_rows(rows: ScanStream) -> Result<Vec<KeyValue>, StoreError> {
    rows.try_collect().await
}
