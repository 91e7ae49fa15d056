//! Sharing commands.

use anyhow::Result;
use todos_client::Dispatcher;
use todos_core::SYNC_SEGMENT;
use todos_types::ListId;

use crate::session::{Paths, Session};

/// Share a list and print its sync group name and invite code.
pub async fn share(paths: &Paths, list: &str, members: &[String]) -> Result<()> {
    let session = Session::open(paths).await?;
    let list_id = ListId::new(list);
    let sg_name = session.dispatcher.share_list(&list_id, members).await?;
    session.save().await?;
    println!("Shared with {}.", members.join(", "));
    println!("  Sync group: {sg_name}");
    println!("  Invite:     {}", session.dispatcher.invite_code(&list_id));
    Ok(())
}

/// Print a list's invite code.
pub async fn invite(paths: &Paths, list: &str) -> Result<()> {
    let session = Session::open(paths).await?;
    println!("{}", session.dispatcher.invite_code(&ListId::new(list)));
    Ok(())
}

/// Join by sync group name or invite code and print the list id.
pub async fn join(paths: &Paths, target: &str) -> Result<()> {
    let session = Session::open(paths).await?;
    let list_id = if is_sync_group_name(target) {
        session.dispatcher.join_sync_group(target).await?;
        session.dispatcher.sg_name_to_list_id(target)?
    } else {
        session.dispatcher.accept_invite(target).await?
    };
    session.save().await?;
    println!("{list_id}");
    Ok(())
}

fn is_sync_group_name(target: &str) -> bool {
    target.contains(&format!("/{SYNC_SEGMENT}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_sync_group_names() {
        assert!(is_sync_group_name("/localhost:4002/$sync/todos/db/tb/abc"));
        assert!(!is_sync_group_name("eyJ2ZXJzaW9uIjoxfQ"));
    }
}
