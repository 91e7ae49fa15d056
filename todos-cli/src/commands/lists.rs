//! List commands.

use anyhow::Result;
use todos_client::Dispatcher;
use todos_types::{ListId, ListRecord};

use crate::session::{Paths, Session};

/// Print every list.
pub async fn show(paths: &Paths) -> Result<()> {
    let session = Session::open(paths).await?;
    let lists = session.dispatcher.get_lists().await?;
    if lists.is_empty() {
        println!("No lists. Create one with 'todos add-list <name>'.");
        return Ok(());
    }
    for list in lists {
        let shared = if list.sync_group.is_some() {
            "  [shared]"
        } else {
            ""
        };
        println!("{}  {}{}", list.id, list.name, shared);
    }
    Ok(())
}

/// Create a list and print its id.
pub async fn add(paths: &Paths, name: &str) -> Result<()> {
    let session = Session::open(paths).await?;
    let id = session.dispatcher.add_list(ListRecord::new(name)).await?;
    session.save().await?;
    println!("{id}");
    Ok(())
}

/// Rename a list.
pub async fn rename(paths: &Paths, list: &str, name: &str) -> Result<()> {
    let session = Session::open(paths).await?;
    session
        .dispatcher
        .edit_list_name(&ListId::new(list), name)
        .await?;
    session.save().await?;
    Ok(())
}
