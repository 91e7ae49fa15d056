//! # todos-client
//!
//! Client library that maps lists, todos and tags onto a shared, syncing
//! key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Caller → Dispatcher → key codec (todos-core) → KvStore (single op or batch)
//!              ↓                                      ↓
//!          EventBus  ←──────  ChangeNotifier (watch stream or polling)
//! ```
//!
//! - **Dispatcher**: entity-level CRUD, atomic multi-key writes, local
//!   change notifications.
//! - **Store abstraction**: pluggable [`KvStore`] / [`Batch`] (in-memory
//!   [`MemStore`] for tests and demos).
//! - **Sharing**: pluggable [`SyncGroups`] (in-memory [`MemSyncGroups`]).
//! - **Change notifier**: remote-change detection via the store's change
//!   stream, or by polling per-list watch counters.
//!
//! ## Example
//!
//! ```ignore
//! use todos_sync_client::{DispatcherConfig, MemStore, MemSyncGroups, SyncDispatcher, Dispatcher};
//! use todos_types::{ListRecord, NewTodo};
//!
//! let dispatcher = SyncDispatcher::new(store, groups, DispatcherConfig::default());
//! let _watch = dispatcher.start_watching().await?;
//!
//! let list = dispatcher.add_list(ListRecord::new("Groceries")).await?;
//! dispatcher.add_todo(&list, NewTodo::new("Milk").with_tags(["dairy"])).await?;
//! let todos = dispatcher.get_todos(&list).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod groups;
pub mod notifier;
pub mod store;

pub use config::{ConfigError, DispatcherConfig, WatchStrategy};
pub use dispatcher::{Dispatcher, SyncDispatcher};
pub use error::DispatchError;
pub use events::{EventBus, Listener, Subscription};
pub use groups::{GroupError, GroupRecord, MemSyncGroups, SyncGroups};
pub use notifier::{PollingWatcher, WatchHandle};
pub use store::{
    collect_rows, run_in_batch, Batch, KeyFilter, KeyValue, KvStore, MemStore, ResumeMarker,
    ScanStream, StoreError, WatchBatch, WatchChange, WatchStream, BATCH_ATTEMPTS,
};
