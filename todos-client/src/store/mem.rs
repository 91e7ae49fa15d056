//! In-memory store for tests and demos.
//!
//! Every handle created with [`MemStore::connect_peer`] is a separate
//! "device" over the same data, so writes from one handle show up on the
//! others' watch streams as `from_sync`. Failure injection follows the
//! `fail_next_*` convention.

use super::{
    Batch, KeyValue, KvStore, ResumeMarker, ScanStream, StoreError, WatchBatch, WatchChange,
    WatchStream,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Committed batches kept for watch resumption.
const LOG_CAPACITY: usize = 4096;

/// Live watch channel capacity.
const CHANNEL_CAPACITY: usize = 1024;

/// One committed batch, as recorded in the change log.
#[derive(Debug)]
struct Committed {
    origin: u64,
    marker: ResumeMarker,
    changes: Vec<(String, Option<Vec<u8>>)>,
}

#[derive(Debug, Clone)]
enum Signal {
    Committed(Arc<Committed>),
    Fail(String),
}

#[derive(Debug, Default)]
struct Shared {
    rows: BTreeMap<String, Vec<u8>>,
    /// Marker of the last write to each key, deletes included.
    versions: HashMap<String, u64>,
    seq: u64,
    log: VecDeque<Arc<Committed>>,
    next_device: u64,
    offline: Option<String>,
    fail_next_put: Option<String>,
    fail_next_commit: Option<String>,
    delete_before_next_commit: Option<String>,
    latency: Duration,
}

impl Shared {
    fn check_online(&self) -> Result<(), StoreError> {
        match &self.offline {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn apply(
        &mut self,
        origin: u64,
        changes: Vec<(String, Option<Vec<u8>>)>,
    ) -> Option<Arc<Committed>> {
        if changes.is_empty() {
            return None;
        }
        self.seq += 1;
        for (key, value) in &changes {
            self.versions.insert(key.clone(), self.seq);
            match value {
                Some(v) => {
                    self.rows.insert(key.clone(), v.clone());
                }
                None => {
                    self.rows.remove(key);
                }
            }
        }
        let committed = Arc::new(Committed {
            origin,
            marker: ResumeMarker(self.seq),
            changes,
        });
        self.log.push_back(Arc::clone(&committed));
        while self.log.len() > LOG_CAPACITY {
            self.log.pop_front();
        }
        Some(committed)
    }
}

/// In-memory ordered key-value store.
///
/// Cloning yields another handle for the *same* device; use
/// [`MemStore::connect_peer`] for a second device.
#[derive(Debug, Clone)]
pub struct MemStore {
    device: u64,
    watchable: bool,
    inner: Arc<Mutex<Shared>>,
    signals: broadcast::Sender<Signal>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::from_rows(BTreeMap::new())
    }

    /// Create a store pre-filled with rows.
    pub fn from_rows(rows: BTreeMap<String, Vec<u8>>) -> Self {
        let (signals, _) = broadcast::channel(CHANNEL_CAPACITY);
        let shared = Shared {
            rows,
            next_device: 1,
            ..Shared::default()
        };
        Self {
            device: 0,
            watchable: true,
            inner: Arc::new(Mutex::new(shared)),
            signals,
        }
    }

    /// Hide the change stream, as a store without watch support would.
    pub fn without_watch(mut self) -> Self {
        self.watchable = false;
        self
    }

    /// A handle for another device over the same data.
    pub fn connect_peer(&self) -> Self {
        let device = {
            let mut inner = self.lock();
            let device = inner.next_device;
            inner.next_device += 1;
            device
        };
        Self {
            device,
            watchable: self.watchable,
            inner: Arc::clone(&self.inner),
            signals: self.signals.clone(),
        }
    }

    /// Copy of every row.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.lock().rows.clone()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    /// True if the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    /// Check for a key without going through the async API.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().rows.contains_key(key)
    }

    /// Make every operation fail with `Unavailable` until cleared.
    pub fn set_offline(&self, reason: Option<&str>) {
        self.lock().offline = reason.map(str::to_string);
    }

    /// Cause the next single-key put to fail with the given error.
    pub fn fail_next_put(&self, error: &str) {
        self.lock().fail_next_put = Some(error.to_string());
    }

    /// Cause the next batch commit to fail with the given error.
    pub fn fail_next_commit(&self, error: &str) {
        self.lock().fail_next_commit = Some(error.to_string());
    }

    /// Have another device delete `key` just before the next batch commit
    /// is checked, as a remote delete landing between read and write.
    pub fn delete_before_next_commit(&self, key: &str) {
        self.lock().delete_before_next_commit = Some(key.to_string());
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Terminate every open watch stream with an error.
    pub fn fail_watchers(&self, error: &str) {
        let _ = self.signals.send(Signal::Fail(error.to_string()));
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_latency(&self) {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Apply and broadcast while the lock is held, so watchers subscribing
    /// under the same lock never miss or duplicate a batch.
    fn commit_changes(
        &self,
        inner: &mut Shared,
        changes: Vec<(String, Option<Vec<u8>>)>,
    ) {
        if let Some(committed) = inner.apply(self.device, changes) {
            // No receivers is fine.
            let _ = self.signals.send(Signal::Committed(committed));
        }
    }
}

fn to_watch_batch(committed: &Committed, prefix: &str, device: u64) -> Option<WatchBatch> {
    let from_sync = committed.origin != device;
    let changes: Vec<WatchChange> = committed
        .changes
        .iter()
        .filter(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| WatchChange {
            key: key.clone(),
            value: value.clone(),
            from_sync,
        })
        .collect();
    if changes.is_empty() {
        return None;
    }
    Some(WatchBatch {
        changes,
        resume_marker: committed.marker,
    })
}

#[async_trait]
impl KvStore for MemStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.simulate_latency().await;
        let inner = self.lock();
        inner.check_online()?;
        inner
            .rows
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.simulate_latency().await;
        let mut inner = self.lock();
        inner.check_online()?;
        if let Some(error) = inner.fail_next_put.take() {
            return Err(StoreError::Unavailable(error));
        }
        self.commit_changes(&mut inner, vec![(key.to_string(), Some(value))]);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.simulate_latency().await;
        let mut inner = self.lock();
        inner.check_online()?;
        if inner.rows.contains_key(key) {
            self.commit_changes(&mut inner, vec![(key.to_string(), None)]);
        }
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<ScanStream, StoreError> {
        self.simulate_latency().await;
        let inner = self.lock();
        inner.check_online()?;
        let rows: Vec<Result<KeyValue, StoreError>> = inner
            .rows
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| {
                Ok(KeyValue {
                    key: key.clone(),
                    value: value.clone(),
                })
            })
            .collect();
        Ok(stream::iter(rows).boxed())
    }

    async fn begin_batch(&self) -> Result<Arc<dyn Batch>, StoreError> {
        self.simulate_latency().await;
        self.lock().check_online()?;
        Ok(Arc::new(MemBatch {
            store: self.clone(),
            state: Mutex::new(BatchState::default()),
        }))
    }

    fn supports_watch(&self) -> bool {
        self.watchable
    }

    async fn resume_marker(&self) -> Result<ResumeMarker, StoreError> {
        self.simulate_latency().await;
        if !self.watchable {
            return Err(StoreError::Unsupported("watch"));
        }
        let inner = self.lock();
        inner.check_online()?;
        Ok(ResumeMarker(inner.seq))
    }

    async fn watch(&self, prefix: &str, from: ResumeMarker) -> Result<WatchStream, StoreError> {
        self.simulate_latency().await;
        if !self.watchable {
            return Err(StoreError::Unsupported("watch"));
        }
        let prefix = prefix.to_string();
        let device = self.device;

        let (backlog, receiver) = {
            let inner = self.lock();
            inner.check_online()?;
            let oldest = inner.log.front().map(|c| c.marker.0).unwrap_or(inner.seq + 1);
            if from.0 + 1 < oldest && from.0 < inner.seq {
                return Err(StoreError::Unavailable(format!(
                    "resume marker {} is no longer in the change log",
                    from.0
                )));
            }
            let backlog: Vec<Result<WatchBatch, StoreError>> = inner
                .log
                .iter()
                .filter(|c| c.marker > from)
                .filter_map(|c| to_watch_batch(c, &prefix, device))
                .map(Ok)
                .collect();
            (backlog, self.signals.subscribe())
        };

        let live = stream::unfold(
            (receiver, prefix, false),
            move |(mut receiver, prefix, done)| async move {
                if done {
                    return None;
                }
                loop {
                    match receiver.recv().await {
                        Ok(Signal::Committed(committed)) => {
                            if let Some(batch) = to_watch_batch(&committed, &prefix, device) {
                                return Some((Ok(batch), (receiver, prefix, false)));
                            }
                        }
                        Ok(Signal::Fail(error)) => {
                            return Some((
                                Err(StoreError::Unavailable(error)),
                                (receiver, prefix, true),
                            ));
                        }
                        Err(RecvError::Lagged(missed)) => {
                            return Some((
                                Err(StoreError::Unavailable(format!(
                                    "watch fell behind by {missed} batches"
                                ))),
                                (receiver, prefix, true),
                            ));
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            },
        );

        Ok(stream::iter(backlog).chain(live).boxed())
    }
}

#[derive(Debug, Default)]
struct BatchState {
    /// Version of each key as first read by this batch.
    reads: HashMap<String, u64>,
    writes: BTreeMap<String, Option<Vec<u8>>>,
    closed: bool,
}

struct MemBatch {
    store: MemStore,
    state: Mutex<BatchState>,
}

impl MemBatch {
    fn state(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stage(&self, key: &str, value: Option<Vec<u8>>) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.closed {
            return Err(StoreError::BatchClosed);
        }
        state.writes.insert(key.to_string(), value);
        Ok(())
    }
}

#[async_trait]
impl Batch for MemBatch {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let mut state = self.state();
        if state.closed {
            return Err(StoreError::BatchClosed);
        }
        let not_found = || StoreError::NotFound {
            key: key.to_string(),
        };
        if let Some(pending) = state.writes.get(key) {
            return pending.clone().ok_or_else(not_found);
        }
        let inner = self.store.lock();
        inner.check_online()?;
        let version = inner.version(key);
        state.reads.entry(key.to_string()).or_insert(version);
        inner.rows.get(key).cloned().ok_or_else(not_found)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.stage(key, Some(value))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.stage(key, None)
    }

    async fn commit(&self) -> Result<(), StoreError> {
        self.store.simulate_latency().await;
        let (reads, writes) = {
            let mut state = self.state();
            if state.closed {
                return Err(StoreError::BatchClosed);
            }
            state.closed = true;
            (
                std::mem::take(&mut state.reads),
                std::mem::take(&mut state.writes),
            )
        };

        let mut inner = self.store.lock();
        inner.check_online()?;
        if let Some(error) = inner.fail_next_commit.take() {
            return Err(StoreError::Unavailable(error));
        }
        if let Some(key) = inner.delete_before_next_commit.take() {
            if inner.rows.contains_key(&key) {
                let peer = inner.next_device;
                inner.next_device += 1;
                if let Some(committed) = inner.apply(peer, vec![(key, None)]) {
                    let _ = self.store.signals.send(Signal::Committed(committed));
                }
            }
        }
        for (key, version) in &reads {
            if inner.version(key) != *version {
                return Err(StoreError::Conflict { key: key.clone() });
            }
        }
        self.store
            .commit_changes(&mut inner, writes.into_iter().collect());
        Ok(())
    }

    async fn abort(&self) {
        let mut state = self.state();
        state.closed = true;
        state.reads.clear();
        state.writes.clear();
    }
}
