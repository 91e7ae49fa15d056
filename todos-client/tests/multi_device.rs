//! Two devices sharing one store.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use todos_sync_client::{
    Dispatcher, DispatcherConfig, MemStore, MemSyncGroups, Subscription, SyncDispatcher,
    WatchStrategy,
};
use todos_types::{ListRecord, NewTodo, Notification};

type Device = SyncDispatcher<MemStore, MemSyncGroups>;

struct Pair {
    alice: Device,
    bob: Device,
}

fn pair(store: MemStore, config: DispatcherConfig) -> Pair {
    let registry = MemSyncGroups::new("alice");
    Pair {
        alice: SyncDispatcher::new(
            Arc::new(store.clone()),
            Arc::new(registry.clone()),
            config.clone(),
        ),
        bob: SyncDispatcher::new(
            Arc::new(store.connect_peer()),
            Arc::new(registry.as_principal("bob")),
            config,
        ),
    }
}

fn fast_config() -> DispatcherConfig {
    DispatcherConfig::default().with_poll_interval(Duration::from_millis(10))
}

fn events(device: &Device) -> (Subscription, mpsc::UnboundedReceiver<Notification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sub = device.on_change(move |n| {
        let _ = tx.send(n.clone());
    });
    (sub, rx)
}

/// Wait for the next change that came from sync.
async fn next_remote(rx: &mut mpsc::UnboundedReceiver<Notification>) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Some(Notification::Change(e)) if e.from_sync => return,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("no remote change within 2s");
}

#[tokio::test]
async fn stream_watch_delivers_peer_writes() {
    let Pair { alice, bob } = pair(MemStore::new(), fast_config());
    assert_eq!(alice.watch_strategy(), WatchStrategy::Stream);
    let (_sub, mut rx) = events(&alice);
    let watch = alice.start_watching().await.unwrap().unwrap();

    let list = bob.add_list(ListRecord::new("Groceries")).await.unwrap();
    next_remote(&mut rx).await;
    bob.add_todo(&list, NewTodo::new("Milk").with_tags(["dairy"]))
        .await
        .unwrap();
    next_remote(&mut rx).await;

    let todos = alice.get_todos(&list).await.unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].tags, vec!["dairy"]);
    watch.shutdown().await;
}

#[tokio::test]
async fn polling_watch_delivers_peer_writes() {
    let Pair { alice, bob } = pair(MemStore::new().without_watch(), fast_config());
    assert_eq!(alice.watch_strategy(), WatchStrategy::Poll);
    let list = alice.add_list(ListRecord::new("Groceries")).await.unwrap();

    let (_sub, mut rx) = events(&alice);
    let watch = alice.start_watching().await.unwrap().unwrap();
    // First poll only primes.
    tokio::time::sleep(Duration::from_millis(50)).await;

    bob.add_todo(&list, NewTodo::new("Milk")).await.unwrap();
    next_remote(&mut rx).await;
    assert_eq!(alice.get_todos(&list).await.unwrap()[0].text, "Milk");
    watch.shutdown().await;
}

#[tokio::test]
async fn own_writes_are_not_reported_as_remote() {
    let Pair { alice, .. } = pair(MemStore::new().without_watch(), fast_config());
    let list = alice.add_list(ListRecord::new("L")).await.unwrap();
    let (_sub, mut rx) = events(&alice);

    assert!(!alice.check_for_changes().await.unwrap());
    alice.add_todo(&list, NewTodo::new("x")).await.unwrap();
    assert!(!alice.check_for_changes().await.unwrap());

    let got = rx.recv().await.unwrap();
    assert_eq!(got.as_change().map(|e| e.from_sync), Some(false));
}

#[tokio::test]
async fn remote_delete_wins_over_local_edit() {
    let Pair { alice, bob } = pair(MemStore::new(), fast_config());
    let list = alice.add_list(ListRecord::new("L")).await.unwrap();
    let todo = alice.add_todo(&list, NewTodo::new("Milk")).await.unwrap();

    bob.remove_todo(&todo).await.unwrap();
    alice.edit_todo_text(&todo, "Oat milk").await.unwrap();
    alice.mark_todo_done(&todo, true).await.unwrap();

    assert!(alice.get_todos(&list).await.unwrap().is_empty());
    assert!(bob.get_todos(&list).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_between_read_and_write_leaves_edit_silent() {
    let store = MemStore::new();
    let Pair { alice, bob } = pair(store.clone(), fast_config());
    let list = alice.add_list(ListRecord::new("L")).await.unwrap();
    let todo = alice.add_todo(&list, NewTodo::new("Milk")).await.unwrap();
    let (_sub, mut rx) = events(&alice);

    store.delete_before_next_commit(todo.as_str());
    alice.edit_todo_text(&todo, "Oat milk").await.unwrap();

    assert!(bob.get_todos(&list).await.unwrap().is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn last_writer_wins_per_key() {
    let Pair { alice, bob } = pair(MemStore::new(), fast_config());
    let list = alice.add_list(ListRecord::new("L")).await.unwrap();
    let todo = alice.add_todo(&list, NewTodo::new("Milk")).await.unwrap();

    alice.edit_todo_text(&todo, "from alice").await.unwrap();
    bob.edit_todo_text(&todo, "from bob").await.unwrap();

    assert_eq!(alice.get_todos(&list).await.unwrap()[0].text, "from bob");
}

#[tokio::test]
async fn shared_list_is_visible_to_both_members() {
    let Pair { alice, bob } = pair(MemStore::new(), fast_config());
    let list = alice.add_list(ListRecord::new("Groceries")).await.unwrap();
    let members = vec!["alice".to_string(), "bob".to_string()];
    alice.share_list(&list, &members).await.unwrap();

    let joined = bob.accept_invite(&alice.invite_code(&list)).await.unwrap();
    assert_eq!(joined, list);

    let lists = bob.get_lists().await.unwrap();
    let group = lists[0].sync_group.as_ref().unwrap();
    assert_eq!(group.name, alice.list_id_to_sg_name(&list));
    assert_eq!(alice.sync_group_members(&group.name).await.unwrap().len(), 2);
}

#[tokio::test]
async fn works_through_a_trait_object() {
    let store = MemStore::new();
    let dispatcher: Arc<dyn Dispatcher> = Arc::new(SyncDispatcher::new(
        Arc::new(store),
        Arc::new(MemSyncGroups::new("alice")),
        DispatcherConfig::default(),
    ));
    let list = dispatcher
        .add_list(ListRecord::new("Groceries"))
        .await
        .unwrap();
    let todo = dispatcher
        .add_todo(&list, NewTodo::new("Milk").with_tags(["dairy"]))
        .await
        .unwrap();
    dispatcher.remove_tag(&todo, "dairy").await.unwrap();

    let todos = dispatcher.get_todos(&list).await.unwrap();
    assert_eq!(todos[0].text, "Milk");
    assert!(todos[0].tags.is_empty());
}

#[tokio::test]
async fn stream_failure_surfaces_watch_error() {
    let store = MemStore::new();
    let Pair { alice, .. } = pair(store.clone(), fast_config());
    let (_sub, mut rx) = events(&alice);
    let _watch = alice.start_watching().await.unwrap().unwrap();

    store.fail_watchers("connection reset");
    let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(got, Notification::WatchError(_)));
}
