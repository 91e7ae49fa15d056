//! Change notifications.
//!
//! A notification is a cue to re-read through the dispatcher. It never
//! carries the changed data.

use serde::{Deserialize, Serialize};

/// Something in the store changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// `true` if the change arrived from a remote peer via sync, `false`
    /// if it was a local mutation made through this dispatcher.
    pub from_sync: bool,
}

impl ChangeEvent {
    /// A change made locally.
    pub fn local() -> Self {
        Self { from_sync: false }
    }

    /// A change observed from sync.
    pub fn remote() -> Self {
        Self { from_sync: true }
    }
}

/// What subscribers receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// Data changed; re-fetch.
    Change(ChangeEvent),
    /// The store's change stream failed. No reconnect is attempted.
    WatchError(String),
}

impl Notification {
    /// The change event, if this is one.
    pub fn as_change(&self) -> Option<ChangeEvent> {
        match self {
            Notification::Change(event) => Some(*event),
            Notification::WatchError(_) => None,
        }
    }
}
