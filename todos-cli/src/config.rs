//! Device identity and dispatcher configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use todos_client::DispatcherConfig;
use todos_types::ClientId;

const DEVICE_FILE: &str = "device.json";

/// Device identity stored locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Client id used for this device's watch counters.
    pub device_id: String,
    /// Principal name used when sharing and joining.
    pub principal: String,
    /// When the device was initialized, seconds since Unix epoch.
    pub created_at: u64,
}

impl DeviceConfig {
    /// Create a new device identity.
    pub fn new(principal: &str) -> Self {
        Self {
            device_id: ClientId::random().as_str().to_string(),
            principal: principal.to_string(),
            created_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Client id for the dispatcher.
    pub fn client_id(&self) -> ClientId {
        ClientId::new(self.device_id.clone())
    }

    /// Load the device identity from a directory.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(DEVICE_FILE);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .context("Device not initialized. Run 'todos init --name <principal>' first.")?;
        serde_json::from_str(&contents).context("Invalid device configuration")
    }

    /// Save the device identity to a directory.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(DEVICE_FILE);
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save device configuration")?;
        Ok(())
    }

    /// Check if the device is initialized.
    pub fn exists(data_dir: &Path) -> bool {
        data_dir.join(DEVICE_FILE).exists()
    }
}

/// Load the dispatcher config. An explicit path must exist; the default
/// path is optional.
pub fn load_dispatcher_config(explicit: Option<&Path>, default: &Path) -> Result<DispatcherConfig> {
    let config = match explicit {
        Some(path) => DispatcherConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None if default.exists() => DispatcherConfig::load(default)
            .with_context(|| format!("Failed to load {}", default.display()))?,
        None => DispatcherConfig::default(),
    };
    Ok(config)
}
