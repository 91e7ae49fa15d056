//! Dispatcher configuration.
//!
//! Loaded from TOML (every field optional) or built in code:
//!
//! ```toml
//! service_root = "/localhost:4002"
//! app = "todos"
//! poll_interval_ms = 500
//! op_timeout_ms = 5000
//! watch = "auto"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use todos_core::SyncGroupNaming;
use todos_types::MemberInfo;

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid configuration.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How remote changes are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchStrategy {
    /// Stream if the store supports it, else poll.
    #[default]
    Auto,
    /// The store's change stream.
    Stream,
    /// Poll per-list watch counters.
    Poll,
    /// Do not detect remote changes.
    Off,
}

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Store addressing root, used in sync group names.
    #[serde(default = "default_service_root")]
    pub service_root: String,
    /// App name.
    #[serde(default = "default_app")]
    pub app: String,
    /// Database name.
    #[serde(default = "default_database")]
    pub database: String,
    /// Table name.
    #[serde(default = "default_table")]
    pub table: String,
    /// Polling interval in milliseconds (default: 500).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Deadline for each operation in milliseconds (default: 5000).
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
    /// Remote change detection.
    #[serde(default)]
    pub watch: WatchStrategy,
    /// Mount table for sync group rendezvous.
    #[serde(default = "default_mount_table")]
    pub mount_table: String,
    /// Sync priority used when creating or joining groups (default: 8).
    #[serde(default = "default_sync_priority")]
    pub sync_priority: u8,
}

fn default_service_root() -> String {
    "/localhost:4002".to_string()
}

fn default_app() -> String {
    "todos".to_string()
}

fn default_database() -> String {
    "db".to_string()
}

fn default_table() -> String {
    "tb".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_op_timeout_ms() -> u64 {
    5000
}

fn default_mount_table() -> String {
    "/ns.dev.v.io:8101".to_string()
}

fn default_sync_priority() -> u8 {
    8
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            service_root: default_service_root(),
            app: default_app(),
            database: default_database(),
            table: default_table(),
            poll_interval_ms: default_poll_interval_ms(),
            op_timeout_ms: default_op_timeout_ms(),
            watch: WatchStrategy::default(),
            mount_table: default_mount_table(),
            sync_priority: default_sync_priority(),
        }
    }
}

impl DispatcherConfig {
    /// Parse from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Set the service root.
    pub fn with_service_root(mut self, root: impl Into<String>) -> Self {
        self.service_root = root.into();
        self
    }

    /// Set the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the per-operation deadline.
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the watch strategy.
    pub fn with_watch(mut self, watch: WatchStrategy) -> Self {
        self.watch = watch;
        self
    }

    /// Set the rendezvous mount table.
    pub fn with_mount_table(mut self, mount_table: impl Into<String>) -> Self {
        self.mount_table = mount_table.into();
        self
    }

    /// Polling interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-operation deadline.
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    /// Sync group naming for this app, database and table.
    pub fn naming(&self) -> SyncGroupNaming {
        SyncGroupNaming::new(&self.service_root, &self.app, &self.database, &self.table)
    }

    /// Member info for creating and joining groups.
    pub fn member_info(&self) -> MemberInfo {
        MemberInfo {
            sync_priority: self.sync_priority,
        }
    }
}
