//! Reconstruction of todos from an ordered prefix scan.
//!
//! In ascending key order a todo's tags follow the todo key directly, since
//! separator `.` sorts below every identifier character. So a single pass
//! suffices: a todo key starts a new todo, and a tag key attaches to the
//! todo most recently started if and only if it is exactly that todo's tag
//! key. Anything else is an orphan of a deleted todo and is skipped.

use todos_types::{ListId, Todo, TodoId, TodoRecord};

use crate::codec::unmarshal;
use crate::error::CoreError;
use crate::keys::{tag_key, KeyKind, SEP};

/// Accumulates scanned rows under `<listId>.todos` into todos.
#[derive(Debug)]
pub struct TodoAssembler {
    list_id: ListId,
    todos: Vec<Todo>,
    orphans: usize,
}

impl TodoAssembler {
    /// Start assembling todos for a list.
    pub fn new(list_id: ListId) -> Self {
        Self {
            list_id,
            todos: Vec::new(),
            orphans: 0,
        }
    }

    /// Feed the next row. Rows must arrive in ascending key order.
    pub fn push(&mut self, key: &str, value: &[u8]) -> Result<(), CoreError> {
        let mut parts = key.split(SEP);
        if parts.next() != Some(self.list_id.as_str()) {
            return Err(CoreError::MalformedKey {
                key: key.to_string(),
            });
        }

        match KeyKind::classify(key)? {
            KeyKind::Todo => {
                let record: TodoRecord = unmarshal(key, value)?;
                self.todos
                    .push(Todo::from_record(TodoId::new(key), record));
            }
            KeyKind::Tag => {
                let tag = key.rsplit(SEP).next().unwrap_or_default();
                match self.todos.last_mut() {
                    Some(todo) if tag_key(&todo.id, tag) == key => {
                        todo.tags.push(tag.to_string());
                    }
                    _ => self.orphans += 1,
                }
            }
            KeyKind::List => {
                return Err(CoreError::MalformedKey {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Number of orphaned tag rows skipped so far.
    pub fn orphans(&self) -> usize {
        self.orphans
    }

    /// Finish, returning todos sorted by timestamp (stable).
    pub fn finish(mut self) -> Vec<Todo> {
        self.todos.sort_by_key(|t| t.timestamp);
        self.todos
    }
}
