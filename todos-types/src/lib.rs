//! # todos-types
//!
//! Foundational types shared by all todos-sync crates:
//! - [`ListId`], [`TodoId`], [`ClientId`] - identifiers
//! - [`ListRecord`], [`TodoRecord`], [`NewTodo`], [`List`], [`Todo`] - entities
//! - [`SyncGroup`], [`SyncGroupSpec`], [`Role`], [`MemberInfo`] - sharing groups
//! - [`ChangeEvent`], [`Notification`] - change notifications

#![warn(missing_docs)]
#![warn(clippy::all)]

mod entities;
mod events;
mod group;
mod ids;

pub use entities::{List, ListRecord, NewTodo, Todo, TodoRecord};
pub use events::{ChangeEvent, Notification};
pub use group::{AccessList, MemberInfo, Role, SyncGroup, SyncGroupSpec};
pub use ids::{uid, ClientId, ListId, TodoId, UID_LEN};
