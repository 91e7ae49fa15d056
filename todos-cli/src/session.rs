//! One CLI invocation's view of the store.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use todos_client::{MemStore, MemSyncGroups, SyncDispatcher, WatchStrategy};

use crate::config::{load_dispatcher_config, DeviceConfig};
use crate::snapshot::Snapshot;

/// Dispatcher type the CLI drives.
pub type CliDispatcher = SyncDispatcher<MemStore, MemSyncGroups>;

/// Resolved file locations.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Data directory.
    pub data_dir: PathBuf,
    /// Store snapshot file.
    pub store: PathBuf,
    /// Explicit dispatcher config file, if given.
    pub config: Option<PathBuf>,
}

impl Paths {
    /// Resolve locations, defaulting into the data directory.
    pub fn new(data_dir: PathBuf, store: Option<PathBuf>, config: Option<PathBuf>) -> Self {
        let store = store.unwrap_or_else(|| data_dir.join("store.json"));
        Self {
            data_dir,
            store,
            config,
        }
    }

    /// Default dispatcher config file location.
    pub fn default_config(&self) -> PathBuf {
        self.data_dir.join("todos.toml")
    }
}

/// An opened store with a dispatcher over it.
pub struct Session {
    /// This device.
    pub device: DeviceConfig,
    /// Dispatcher over the snapshot.
    pub dispatcher: CliDispatcher,
    store: MemStore,
    groups: MemSyncGroups,
    snapshot_path: PathBuf,
}

impl Session {
    /// Load the device identity, config and snapshot.
    pub async fn open(paths: &Paths) -> Result<Self> {
        let device = DeviceConfig::load(&paths.data_dir).await?;
        // One-shot process: nothing to watch.
        let config = load_dispatcher_config(paths.config.as_deref(), &paths.default_config())?
            .with_watch(WatchStrategy::Off);
        let (store, groups) = Snapshot::load(&paths.store)
            .await?
            .restore(&device.principal)?;
        tracing::debug!(
            store = %paths.store.display(),
            rows = store.len(),
            "Opened store snapshot"
        );
        let dispatcher = SyncDispatcher::with_client_id(
            Arc::new(store.clone()),
            Arc::new(groups.clone()),
            config,
            device.client_id(),
        );
        Ok(Self {
            device,
            dispatcher,
            store,
            groups,
            snapshot_path: paths.store.clone(),
        })
    }

    /// Number of stored rows.
    pub fn row_count(&self) -> usize {
        self.store.len()
    }

    /// Number of sync groups.
    pub fn group_count(&self) -> usize {
        self.groups.snapshot().len()
    }

    /// Write the store back.
    pub async fn save(&self) -> Result<()> {
        Snapshot::capture(&self.store, &self.groups)
            .save(&self.snapshot_path)
            .await
    }
}
