//! The dispatcher: entity-level operations over the key-value store.
//!
//! Every operation is an independent request bounded by the configured
//! deadline. Multi-key writes run in one atomic batch. A successful
//! mutation publishes a local change after the store acknowledges it;
//! failures publish nothing.

use async_trait::async_trait;
use futures::future::try_join_all;
use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

use todos_core::{
    key_to_list_id, marshal, new_list_key, new_todo_key, sanitize_tag, tag_key, todos_prefix,
    unmarshal, KeyKind, ListInvite, SyncGroupNaming, TodoAssembler, SEP,
};
use todos_types::{
    ChangeEvent, ClientId, List, ListId, ListRecord, MemberInfo, NewTodo, Notification,
    SyncGroup, SyncGroupSpec, Todo, TodoId, TodoRecord,
};

use crate::config::{DispatcherConfig, WatchStrategy};
use crate::error::DispatchError;
use crate::events::{EventBus, Listener, Subscription};
use crate::groups::{GroupError, SyncGroups};
use crate::notifier::{spawn_poll_loop, spawn_stream_watch, PollingWatcher, WatchHandle};
use crate::store::{run_in_batch, KeyFilter, KvStore, StoreError};

/// Caller-facing operations on lists, todos, tags and sharing.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// All lists with their sync group, sorted by name (case-sensitive).
    async fn get_lists(&self) -> Result<Vec<List>, DispatchError>;

    /// Todos of a list with their tags, sorted by timestamp.
    async fn get_todos(&self, list_id: &ListId) -> Result<Vec<Todo>, DispatchError>;

    /// Create a list; returns its generated id.
    async fn add_list(&self, list: ListRecord) -> Result<ListId, DispatchError>;

    /// Rename a list. A list deleted concurrently is left alone.
    async fn edit_list_name(&self, list_id: &ListId, name: &str) -> Result<(), DispatchError>;

    /// Create a todo and its tags atomically; returns its id.
    async fn add_todo(&self, list_id: &ListId, todo: NewTodo) -> Result<TodoId, DispatchError>;

    /// Delete a todo. Its tags stay behind as orphans.
    async fn remove_todo(&self, todo_id: &TodoId) -> Result<(), DispatchError>;

    /// Change a todo's text. A todo deleted concurrently is left alone.
    async fn edit_todo_text(&self, todo_id: &TodoId, text: &str) -> Result<(), DispatchError>;

    /// Set a todo's done flag. A todo deleted concurrently is left alone.
    async fn mark_todo_done(&self, todo_id: &TodoId, done: bool) -> Result<(), DispatchError>;

    /// Attach a tag. Tags that sanitize to nothing are ignored.
    async fn add_tag(&self, todo_id: &TodoId, tag: &str) -> Result<(), DispatchError>;

    /// Detach a tag.
    async fn remove_tag(&self, todo_id: &TodoId, tag: &str) -> Result<(), DispatchError>;

    /// Create the sync group `sg_name`, granting every role to `members`.
    async fn create_sync_group(
        &self,
        sg_name: &str,
        members: &[String],
        mount_table: &str,
    ) -> Result<(), DispatchError>;

    /// Join the sync group `sg_name`. Joining twice is not an error.
    async fn join_sync_group(&self, sg_name: &str) -> Result<(), DispatchError>;

    /// Always fails: membership is fixed at creation.
    async fn add_sync_group_members(
        &self,
        sg_name: &str,
        members: &[String],
    ) -> Result<(), DispatchError>;

    /// List id a sync group name refers to.
    fn sg_name_to_list_id(&self, sg_name: &str) -> Result<ListId, DispatchError>;

    /// Sync group name for a list.
    fn list_id_to_sg_name(&self, list_id: &ListId) -> String;

    /// Listen for change notifications until the subscription is dropped.
    fn subscribe(&self, listener: Listener) -> Subscription;
}

/// Outcome of a read-modify-write.
enum Update {
    Applied,
    /// The key was gone by the time it was read.
    Vanished,
}

/// [`Dispatcher`] over a syncing key-value store and a sync group registry.
pub struct SyncDispatcher<S: ?Sized, G: ?Sized> {
    store: Arc<S>,
    groups: Arc<G>,
    config: DispatcherConfig,
    naming: SyncGroupNaming,
    bus: Arc<EventBus>,
    poller: Arc<PollingWatcher<S>>,
    bump_counters: bool,
}

impl<S, G> SyncDispatcher<S, G>
where
    S: KvStore + ?Sized + 'static,
    G: SyncGroups + ?Sized + 'static,
{
    /// Create a dispatcher with a random client id.
    pub fn new(store: Arc<S>, groups: Arc<G>, config: DispatcherConfig) -> Self {
        Self::with_client_id(store, groups, config, ClientId::random())
    }

    /// Create a dispatcher with a fixed client id.
    pub fn with_client_id(
        store: Arc<S>,
        groups: Arc<G>,
        config: DispatcherConfig,
        client_id: ClientId,
    ) -> Self {
        // Peers poll when the store has no change stream, so counters are
        // kept whenever polling may be in use.
        let bump_counters = !store.supports_watch() || config.watch == WatchStrategy::Poll;
        Self {
            poller: Arc::new(PollingWatcher::new(Arc::clone(&store), client_id)),
            naming: config.naming(),
            store,
            groups,
            config,
            bus: Arc::new(EventBus::new()),
            bump_counters,
        }
    }

    /// This dispatcher's client id.
    pub fn client_id(&self) -> &ClientId {
        self.poller.client_id()
    }

    /// Active configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Subscribe with a closure.
    pub fn on_change(
        &self,
        listener: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.subscribe(Arc::new(listener))
    }

    /// Strategy that `start_watching` will use.
    pub fn watch_strategy(&self) -> WatchStrategy {
        match self.config.watch {
            WatchStrategy::Auto if self.store.supports_watch() => WatchStrategy::Stream,
            WatchStrategy::Auto => WatchStrategy::Poll,
            other => other,
        }
    }

    /// Start remote change detection. `None` when watching is off.
    pub async fn start_watching(&self) -> Result<Option<WatchHandle>, DispatchError> {
        match self.watch_strategy() {
            WatchStrategy::Off => Ok(None),
            WatchStrategy::Stream => {
                let handle = self
                    .bounded(
                        "start_watching",
                        spawn_stream_watch(
                            Arc::clone(&self.store),
                            Arc::clone(&self.bus),
                            String::new(),
                        ),
                    )
                    .await?;
                Ok(Some(handle))
            }
            WatchStrategy::Poll | WatchStrategy::Auto => Ok(Some(spawn_poll_loop(
                Arc::clone(&self.poller),
                Arc::clone(&self.bus),
                self.config.poll_interval(),
                self.config.op_timeout(),
            ))),
        }
    }

    /// Run one poll now, without the background loop.
    pub async fn check_for_changes(&self) -> Result<bool, DispatchError> {
        self.bounded("check_for_changes", self.poller.check_for_changes())
            .await
    }

    /// Share a list with `members` through the configured mount table;
    /// returns the sync group name.
    pub async fn share_list(
        &self,
        list_id: &ListId,
        members: &[String],
    ) -> Result<String, DispatchError> {
        let sg_name = self.naming.list_id_to_sg_name(list_id);
        self.create_sync_group(&sg_name, members, &self.config.mount_table)
            .await?;
        Ok(sg_name)
    }

    /// Invite code for a list's sync group.
    pub fn invite_code(&self, list_id: &ListId) -> String {
        ListInvite::new(self.naming.list_id_to_sg_name(list_id)).to_code()
    }

    /// Join the sync group named by an invite code; returns the list id.
    pub async fn accept_invite(&self, code: &str) -> Result<ListId, DispatchError> {
        let invite = ListInvite::from_code(code)?;
        let list_id = self.naming.sg_name_to_list_id(&invite.sg_name)?;
        self.join_sync_group(&invite.sg_name).await?;
        Ok(list_id)
    }

    /// Members of a sync group.
    pub async fn sync_group_members(
        &self,
        sg_name: &str,
    ) -> Result<BTreeMap<String, MemberInfo>, DispatchError> {
        self.bounded("sync_group_members", async move {
            Ok(self.groups.get_members(sg_name).await?)
        })
        .await
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, DispatchError>
    where
        F: Future<Output = Result<T, DispatchError>> + Send,
    {
        let deadline = self.config.op_timeout();
        async move {
            match tokio::time::timeout(deadline, fut).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "operation failed");
                    Err(e)
                }
                Err(_) => {
                    tracing::warn!(timeout_ms = deadline.as_millis() as u64, "operation timed out");
                    Err(DispatchError::Timeout)
                }
            }
        }
        .instrument(tracing::debug_span!("dispatch", op))
        .await
    }

    /// Publish a local change, then advance the watch counter for the list.
    async fn announce(&self, list_id: Option<&ListId>) {
        self.bus
            .publish(&Notification::Change(ChangeEvent::local()));
        if !self.bump_counters {
            return;
        }
        if let Some(list_id) = list_id {
            if let Err(e) = self.poller.bump(list_id).await {
                tracing::warn!(list = %list_id, error = %e, "failed to bump watch counter");
            }
        }
    }

    /// Read, modify and write one record inside a batch. A batch that
    /// conflicts is rerun, so a key deleted by another device in between
    /// ends as [`Update::Vanished`].
    async fn update_record<R, F>(&self, key: &str, apply: F) -> Result<Update, DispatchError>
    where
        R: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(&mut R) + Send + Sync + 'static,
    {
        let apply = Arc::new(apply);
        run_in_batch(&*self.store, |batch| {
            let key = key.to_string();
            let apply = Arc::clone(&apply);
            async move {
                let current = match batch.get(&key).await {
                    Ok(bytes) => bytes,
                    Err(StoreError::NotFound { .. }) => return Ok(Update::Vanished),
                    Err(e) => return Err(DispatchError::from(e)),
                };
                let mut record: R = unmarshal(&key, &current)?;
                apply(&mut record);
                batch.put(&key, marshal(&record)?).await?;
                Ok(Update::Applied)
            }
        })
        .await
    }

    async fn finish_update(&self, outcome: Update, key: &str, list_id: &ListId) {
        match outcome {
            Update::Applied => self.announce(Some(list_id)).await,
            Update::Vanished => tracing::debug!(key, "target vanished; nothing updated"),
        }
    }

    async fn fetch_lists(&self) -> Result<Vec<List>, DispatchError> {
        let mut rows = self.store.query(KeyFilter::Excludes(SEP)).await?;
        let mut lists = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let record: ListRecord = unmarshal(&row.key, &row.value)?;
            lists.push(List {
                id: ListId::new(row.key),
                name: record.name,
                sync_group: None,
            });
        }
        Ok(lists)
    }

    async fn fetch_sync_groups(&self) -> Result<Vec<SyncGroup>, DispatchError> {
        let names = self.groups.list_names().await?;
        let groups = try_join_all(names.into_iter().map(|name| async move {
            match self.groups.get_spec(&name).await {
                Ok(spec) => Ok(Some(SyncGroup { name, spec })),
                // Destroyed between listing and reading.
                Err(GroupError::NotFound(_)) => Ok(None),
                Err(e) => Err(DispatchError::from(e)),
            }
        }))
        .await?;
        Ok(groups.into_iter().flatten().collect())
    }

    fn group_list_id(&self, group: &SyncGroup) -> Option<ListId> {
        match group.spec.prefixes.as_slice() {
            [prefix] => self.naming.list_id_from_prefix(prefix),
            _ => None,
        }
    }
}

/// The id must be list-shaped.
fn check_list(list_id: &ListId) -> Result<(), DispatchError> {
    match KeyKind::classify(list_id.as_str())? {
        KeyKind::List => Ok(()),
        _ => Err(DispatchError::MalformedKey {
            key: list_id.to_string(),
        }),
    }
}

/// List a todo belongs to; the id must be todo-shaped.
fn todo_list(todo_id: &TodoId) -> Result<ListId, DispatchError> {
    match KeyKind::classify(todo_id.as_str())? {
        KeyKind::Todo => Ok(key_to_list_id(todo_id.as_str())?),
        _ => Err(DispatchError::MalformedKey {
            key: todo_id.to_string(),
        }),
    }
}

#[async_trait]
impl<S, G> Dispatcher for SyncDispatcher<S, G>
where
    S: KvStore + ?Sized + 'static,
    G: SyncGroups + ?Sized + 'static,
{
    async fn get_lists(&self) -> Result<Vec<List>, DispatchError> {
        self.bounded("get_lists", async move {
            tracing::debug!("get_lists");
            let (mut lists, groups) =
                futures::try_join!(self.fetch_lists(), self.fetch_sync_groups())?;
            for list in &mut lists {
                list.sync_group = groups
                    .iter()
                    .find(|g| self.group_list_id(g).as_ref() == Some(&list.id))
                    .cloned();
            }
            lists.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(lists)
        })
        .await
    }

    async fn get_todos(&self, list_id: &ListId) -> Result<Vec<Todo>, DispatchError> {
        self.bounded("get_todos", async move {
            tracing::debug!(list = %list_id, "get_todos");
            let mut rows = self.store.scan(&todos_prefix(list_id)).await?;
            let mut assembler = TodoAssembler::new(list_id.clone());
            while let Some(row) = rows.try_next().await? {
                assembler.push(&row.key, &row.value)?;
            }
            if assembler.orphans() > 0 {
                tracing::debug!(orphans = assembler.orphans(), "skipped orphaned tags");
            }
            Ok(assembler.finish())
        })
        .await
    }

    async fn add_list(&self, list: ListRecord) -> Result<ListId, DispatchError> {
        self.bounded("add_list", async move {
            tracing::debug!(name = %list.name, "add_list");
            let list_id = new_list_key();
            self.store.put(list_id.as_str(), marshal(&list)?).await?;
            self.announce(Some(&list_id)).await;
            Ok(list_id)
        })
        .await
    }

    async fn edit_list_name(&self, list_id: &ListId, name: &str) -> Result<(), DispatchError> {
        self.bounded("edit_list_name", async move {
            tracing::debug!(list = %list_id, name, "edit_list_name");
            check_list(list_id)?;
            let name = name.to_string();
            let outcome = self
                .update_record(list_id.as_str(), move |list: &mut ListRecord| {
                    list.name.clone_from(&name);
                })
                .await?;
            self.finish_update(outcome, list_id.as_str(), list_id).await;
            Ok(())
        })
        .await
    }

    async fn add_todo(&self, list_id: &ListId, todo: NewTodo) -> Result<TodoId, DispatchError> {
        self.bounded("add_todo", async move {
            tracing::debug!(list = %list_id, text = %todo.text, "add_todo");
            let todo_id = new_todo_key(list_id);
            let (record, tags) = todo.into_parts();
            let value = marshal(&record)?;
            let mut tag_keys: Vec<String> = tags
                .iter()
                .filter(|tag| !sanitize_tag(tag).is_empty())
                .map(|tag| tag_key(&todo_id, tag))
                .collect();
            tag_keys.sort();
            tag_keys.dedup();

            let key = todo_id.as_str().to_string();
            run_in_batch(&*self.store, |batch| {
                let (key, value, tag_keys) = (key.clone(), value.clone(), tag_keys.clone());
                async move {
                    batch.put(&key, value).await?;
                    for tag in &tag_keys {
                        batch.put(tag, Vec::new()).await?;
                    }
                    Ok::<_, DispatchError>(())
                }
            })
            .await?;

            self.announce(Some(list_id)).await;
            Ok(todo_id)
        })
        .await
    }

    async fn remove_todo(&self, todo_id: &TodoId) -> Result<(), DispatchError> {
        self.bounded("remove_todo", async move {
            tracing::debug!(todo = %todo_id, "remove_todo");
            let list_id = todo_list(todo_id)?;
            self.store.delete(todo_id.as_str()).await?;
            self.announce(Some(&list_id)).await;
            Ok(())
        })
        .await
    }

    async fn edit_todo_text(&self, todo_id: &TodoId, text: &str) -> Result<(), DispatchError> {
        self.bounded("edit_todo_text", async move {
            tracing::debug!(todo = %todo_id, text, "edit_todo_text");
            let list_id = todo_list(todo_id)?;
            let text = text.to_string();
            let outcome = self
                .update_record(todo_id.as_str(), move |todo: &mut TodoRecord| {
                    todo.text.clone_from(&text);
                })
                .await?;
            self.finish_update(outcome, todo_id.as_str(), &list_id).await;
            Ok(())
        })
        .await
    }

    async fn mark_todo_done(&self, todo_id: &TodoId, done: bool) -> Result<(), DispatchError> {
        self.bounded("mark_todo_done", async move {
            tracing::debug!(todo = %todo_id, done, "mark_todo_done");
            let list_id = todo_list(todo_id)?;
            let outcome = self
                .update_record(todo_id.as_str(), move |todo: &mut TodoRecord| {
                    todo.done = done;
                })
                .await?;
            self.finish_update(outcome, todo_id.as_str(), &list_id).await;
            Ok(())
        })
        .await
    }

    async fn add_tag(&self, todo_id: &TodoId, tag: &str) -> Result<(), DispatchError> {
        self.bounded("add_tag", async move {
            tracing::debug!(todo = %todo_id, tag, "add_tag");
            let list_id = todo_list(todo_id)?;
            if sanitize_tag(tag).is_empty() {
                return Ok(());
            }
            self.store.put(&tag_key(todo_id, tag), Vec::new()).await?;
            self.announce(Some(&list_id)).await;
            Ok(())
        })
        .await
    }

    async fn remove_tag(&self, todo_id: &TodoId, tag: &str) -> Result<(), DispatchError> {
        self.bounded("remove_tag", async move {
            tracing::debug!(todo = %todo_id, tag, "remove_tag");
            let list_id = todo_list(todo_id)?;
            if sanitize_tag(tag).is_empty() {
                return Ok(());
            }
            self.store.delete(&tag_key(todo_id, tag)).await?;
            self.announce(Some(&list_id)).await;
            Ok(())
        })
        .await
    }

    async fn create_sync_group(
        &self,
        sg_name: &str,
        members: &[String],
        mount_table: &str,
    ) -> Result<(), DispatchError> {
        self.bounded("create_sync_group", async move {
            tracing::debug!(sg_name, ?members, mount_table, "create_sync_group");
            let list_id = self.naming.sg_name_to_list_id(sg_name)?;
            let spec = SyncGroupSpec::grant_all(
                members,
                self.naming.prefix_for(&list_id),
                vec![format!("{}/rendezvous", mount_table.trim_end_matches('/'))],
            );
            self.groups
                .create(sg_name, spec, self.config.member_info())
                .await?;
            self.announce(None).await;
            Ok(())
        })
        .await
    }

    async fn join_sync_group(&self, sg_name: &str) -> Result<(), DispatchError> {
        self.bounded("join_sync_group", async move {
            tracing::debug!(sg_name, "join_sync_group");
            self.groups
                .join(sg_name, self.config.member_info())
                .await?;
            self.announce(None).await;
            Ok(())
        })
        .await
    }

    async fn add_sync_group_members(
        &self,
        sg_name: &str,
        members: &[String],
    ) -> Result<(), DispatchError> {
        self.bounded("add_sync_group_members", async move {
            tracing::debug!(sg_name, ?members, "add_sync_group_members");
            self.groups.get_spec(sg_name).await?;
            Err(DispatchError::Unsupported(
                "adding members to an existing sync group".to_string(),
            ))
        })
        .await
    }

    fn sg_name_to_list_id(&self, sg_name: &str) -> Result<ListId, DispatchError> {
        Ok(self.naming.sg_name_to_list_id(sg_name)?)
    }

    fn list_id_to_sg_name(&self, list_id: &ListId) -> String {
        self.naming.list_id_to_sg_name(list_id)
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.bus.subscribe(listener)
    }
}
