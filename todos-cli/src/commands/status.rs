//! Show device and store status.

use anyhow::Result;
use todos_client::Dispatcher;

use crate::config::DeviceConfig;
use crate::session::{Paths, Session};

/// Run the status command.
pub async fn run(paths: &Paths) -> Result<()> {
    if !DeviceConfig::exists(&paths.data_dir) {
        println!("Device: NOT INITIALIZED");
        println!();
        println!("Run 'todos init --name <principal>' to initialize.");
        return Ok(());
    }

    let session = Session::open(paths).await?;
    let lists = session.dispatcher.get_lists().await?;
    let shared = lists.iter().filter(|l| l.sync_group.is_some()).count();
    let config = session.dispatcher.config();

    println!("Device:");
    println!("  Principal: {}", session.device.principal);
    println!("  ID:        {}", &session.device.device_id[..8]);
    println!();
    println!("Store:");
    println!("  File:      {}", paths.store.display());
    println!("  Service:   {}", config.service_root);
    println!("  Rows:      {}", session.row_count());
    println!("  Lists:     {} ({} shared)", lists.len(), shared);
    println!("  Groups:    {}", session.group_count());

    Ok(())
}
