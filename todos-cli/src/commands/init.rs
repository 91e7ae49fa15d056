//! Initialize device identity.

use anyhow::{Context, Result};

use crate::config::DeviceConfig;
use crate::seed;
use crate::session::{Paths, Session};

/// Run the init command.
pub async fn run(paths: &Paths, principal: &str, with_seed: bool) -> Result<()> {
    if DeviceConfig::exists(&paths.data_dir) {
        anyhow::bail!(
            "Device already initialized. Delete {} to reinitialize.",
            paths.data_dir.join("device.json").display()
        );
    }

    let config = DeviceConfig::new(principal);
    config.save(&paths.data_dir).await?;

    println!("Device initialized.");
    println!("  Principal: {}", config.principal);
    println!("  Device ID: {}", &config.device_id[..8]);
    println!("  Store:     {}", paths.store.display());

    if with_seed {
        let session = Session::open(paths).await?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        let added = seed::load(&session.dispatcher, now)
            .await
            .context("Failed to load demo lists")?;
        session.save().await?;
        println!("  Seeded:    {added} todos");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use todos_client::Dispatcher;

    fn paths(dir: &std::path::Path) -> Paths {
        Paths::new(dir.to_path_buf(), None, None)
    }

    #[tokio::test]
    async fn init_creates_device_config() {
        let dir = tempdir().unwrap();
        run(&paths(dir.path()), "alice", false).await.unwrap();

        let config = DeviceConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.principal, "alice");
        assert!(!dir.path().join("store.json").exists());
    }

    #[tokio::test]
    async fn init_fails_if_already_initialized() {
        let dir = tempdir().unwrap();
        run(&paths(dir.path()), "alice", false).await.unwrap();
        assert!(run(&paths(dir.path()), "bob", false).await.is_err());
    }

    #[tokio::test]
    async fn init_with_seed_writes_store() {
        let dir = tempdir().unwrap();
        run(&paths(dir.path()), "alice", true).await.unwrap();

        let session = Session::open(&paths(dir.path())).await.unwrap();
        assert_eq!(session.dispatcher.get_lists().await.unwrap().len(), 3);
    }
}
