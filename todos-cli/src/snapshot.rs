//! Store snapshot file.
//!
//! Rows are kept with base64 values so arbitrary bytes survive JSON.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use todos_client::{GroupRecord, MemStore, MemSyncGroups};

/// Serialized store and sync group registry.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Key → base64 value.
    #[serde(default)]
    pub rows: BTreeMap<String, String>,
    /// Sync groups by name.
    #[serde(default)]
    pub groups: BTreeMap<String, GroupRecord>,
}

impl Snapshot {
    /// Capture a store and registry.
    pub fn capture(store: &MemStore, groups: &MemSyncGroups) -> Self {
        Self {
            rows: store
                .snapshot()
                .into_iter()
                .map(|(key, value)| (key, STANDARD.encode(value)))
                .collect(),
            groups: groups.snapshot(),
        }
    }

    /// Rebuild a store and a registry acting as `principal`.
    pub fn restore(self, principal: &str) -> Result<(MemStore, MemSyncGroups)> {
        let mut rows = BTreeMap::new();
        for (key, value) in self.rows {
            let bytes = STANDARD
                .decode(value.as_bytes())
                .with_context(|| format!("Corrupt value for key {key}"))?;
            rows.insert(key, bytes);
        }
        Ok((
            MemStore::from_rows(rows),
            MemSyncGroups::from_records(principal, self.groups),
        ))
    }

    /// Load from a file; a missing file is an empty snapshot.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Invalid store snapshot {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    /// Write to a file.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
