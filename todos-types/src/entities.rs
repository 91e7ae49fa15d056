//! List and todo entities.
//!
//! `*Record` types are what gets serialized under an entity's key. The
//! read-side types ([`List`], [`Todo`]) add the identifier and the data
//! reconstructed from other keys (sync group, tags).

use serde::{Deserialize, Serialize};

use crate::group::SyncGroup;
use crate::ids::{ListId, TodoId};

/// Stored value of a list key. Also the input to `add_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRecord {
    /// Display name.
    pub name: String,
}

impl ListRecord {
    /// Create a list record with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Stored value of a todo key.
///
/// Tags are not part of the record; each tag is its own key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoRecord {
    /// Todo text.
    pub text: String,
    /// Completion flag.
    #[serde(default)]
    pub done: bool,
    /// Client-assigned creation time, milliseconds since Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

/// Input to `add_todo`: a todo record plus the tags to attach.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewTodo {
    /// Todo text.
    pub text: String,
    /// Completion flag.
    #[serde(default)]
    pub done: bool,
    /// Client-assigned creation time, milliseconds since Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
    /// Tags to write alongside the todo. Tags that sanitize to nothing are dropped.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewTodo {
    /// Create a not-yet-done todo with no tags and timestamp 0.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Set the tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the timestamp.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the done flag.
    pub fn with_done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    /// Split into the stored record and the tag list.
    pub fn into_parts(self) -> (TodoRecord, Vec<String>) {
        (
            TodoRecord {
                text: self.text,
                done: self.done,
                timestamp: self.timestamp,
            },
            self.tags,
        )
    }
}

/// A list as presented to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    /// List identifier (its key).
    pub id: ListId,
    /// Display name.
    pub name: String,
    /// Sharing group scoped to this list, if one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_group: Option<SyncGroup>,
}

/// A todo as presented to callers, with its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Todo identifier (its key).
    pub id: TodoId,
    /// Todo text.
    pub text: String,
    /// Completion flag.
    pub done: bool,
    /// Client-assigned creation time, milliseconds since Unix epoch.
    pub timestamp: i64,
    /// Tags, in ascending key order.
    pub tags: Vec<String>,
}

impl Todo {
    /// Build a todo from its key, stored record and no tags.
    pub fn from_record(id: TodoId, record: TodoRecord) -> Self {
        Self {
            id,
            text: record.text,
            done: record.done,
            timestamp: record.timestamp,
            tags: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_todo_builder() {
        let todo = NewTodo::new("Milk")
            .with_tags(["dairy", "fridge"])
            .with_timestamp(42)
            .with_done(true);
        assert_eq!(todo.text, "Milk");
        assert_eq!(todo.tags, vec!["dairy", "fridge"]);
        assert_eq!(todo.timestamp, 42);
        assert!(todo.done);
    }

    #[test]
    fn into_parts_strips_tags() {
        let (record, tags) = NewTodo::new("Milk").with_tags(["dairy"]).into_parts();
        assert_eq!(record.text, "Milk");
        assert!(!record.done);
        assert_eq!(tags, vec!["dairy"]);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn todo_record_defaults_missing_fields() {
        let record: TodoRecord = serde_json::from_str(r#"{"text":"x"}"#).unwrap();
        assert!(!record.done);
        assert_eq!(record.timestamp, 0);
    }

    #[test]
    fn list_without_group_omits_field() {
        let list = List {
            id: ListId::new("L"),
            name: "Groceries".into(),
            sync_group: None,
        };
        let json = serde_json::to_value(&list).unwrap();
        assert!(json.get("sync_group").is_none());
    }
}
