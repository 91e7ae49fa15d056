//! Polling change detection.

use futures::future::try_join_all;
use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};
use todos_core::{
    encode_seq, version_string, watch_key, watch_key_client, watch_prefix, ChangeDetector,
    VersionMap, SEP,
};
use todos_types::{ChangeEvent, ClientId, ListId, Notification};

use super::WatchHandle;
use crate::error::DispatchError;
use crate::events::EventBus;
use crate::store::{KeyFilter, KvStore, StoreError};

/// Per-client watch counters and the poller that compares them.
///
/// State is owned by the instance, so several dispatchers in one process
/// poll independently.
pub struct PollingWatcher<S: ?Sized> {
    store: Arc<S>,
    client_id: ClientId,
    seq: AtomicU64,
    detector: Mutex<ChangeDetector>,
}

impl<S: KvStore + ?Sized> PollingWatcher<S> {
    /// Create a watcher for `client_id`.
    pub fn new(store: Arc<S>, client_id: ClientId) -> Self {
        Self {
            store,
            client_id,
            seq: AtomicU64::new(0),
            detector: Mutex::new(ChangeDetector::new()),
        }
    }

    /// This client's id.
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Advance this client's counter under `list_id`.
    pub async fn bump(&self, list_id: &ListId) -> Result<(), StoreError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.store
            .put(&watch_key(list_id, &self.client_id), encode_seq(seq))
            .await
    }

    /// Fingerprint every list; true if another client's counters moved
    /// since the previous call. The first call only primes.
    pub async fn check_for_changes(&self) -> Result<bool, DispatchError> {
        let lists: Vec<ListId> = self
            .store
            .query(KeyFilter::Excludes(SEP))
            .await?
            .map_ok(|row| ListId::new(row.key))
            .try_collect()
            .await?;

        let versions = try_join_all(lists.into_iter().map(|list_id| async move {
            let version = self.list_version(&list_id).await?;
            Ok::<_, DispatchError>((list_id, version))
        }))
        .await?;
        let versions: VersionMap = versions.into_iter().collect();

        let mut detector = self.detector.lock().unwrap_or_else(|e| e.into_inner());
        Ok(detector.observe(versions))
    }

    async fn list_version(&self, list_id: &ListId) -> Result<String, DispatchError> {
        let mut rows = self.store.scan(&watch_prefix(list_id)).await?;
        let mut counters = BTreeMap::new();
        while let Some(row) = rows.try_next().await? {
            let client = watch_key_client(list_id, &row.key)?;
            counters.insert(client, String::from_utf8_lossy(&row.value).into_owned());
        }
        Ok(version_string(&counters, &self.client_id))
    }
}

/// Spawn the polling loop: check every `period`, publish a remote change
/// when one is detected. Each check is cut off after `deadline`. Failures
/// and timeouts are logged and polling continues.
pub fn spawn_poll_loop<S>(
    watcher: Arc<PollingWatcher<S>>,
    bus: Arc<EventBus>,
    period: Duration,
    deadline: Duration,
) -> WatchHandle
where
    S: KvStore + ?Sized + 'static,
{
    let (stop_tx, mut stop_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        tracing::info!(
            client = %watcher.client_id(),
            interval_ms = period.as_millis() as u64,
            "Polling watch started"
        );
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = timer.tick() => {}
            }
            let checked = tokio::time::timeout(deadline, watcher.check_for_changes())
                .await
                .unwrap_or(Err(DispatchError::Timeout));
            match checked {
                Ok(true) => {
                    tracing::debug!("Poll detected remote change");
                    bus.publish(&Notification::Change(ChangeEvent::remote()));
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "Poll failed"),
            }
        }
        tracing::info!("Polling watch stopped");
    });
    WatchHandle::new(stop_tx, task)
}
