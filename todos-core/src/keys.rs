//! Key codec.
//!
//! Keys are separator-delimited ASCII segments. The segment count alone
//! tells the entity kind: 1 = list, 3 = todo, 5 = tag. Per-list watch keys
//! also have 3 segments and classify as todo-shaped; they live under their
//! own `watch` namespace and are never scanned as todos.

use todos_types::{uid, ClientId, ListId, TodoId};

use crate::error::CoreError;

/// Key segment separator.
pub const SEP: char = '.';
const SEP_STR: &str = ".";

const TODOS: &str = "todos";
const TAGS: &str = "tags";
const WATCH: &str = "watch";

/// Punctuation allowed in tag names, before the separator is stripped.
const TAG_PUNCTUATION: [char; 3] = ['_', '.', '-'];

/// Join segments with the separator.
pub fn join(parts: &[&str]) -> String {
    parts.join(SEP_STR)
}

/// Generate a new list key.
pub fn new_list_key() -> ListId {
    ListId::new(uid())
}

/// Generate a new todo key inside a list: `<listId>.todos.<uid>`.
pub fn new_todo_key(list_id: &ListId) -> TodoId {
    TodoId::new(join(&[list_id.as_str(), TODOS, &uid()]))
}

/// Key of a tag on a todo: `<todoId>.tags.<sanitized tag>`.
pub fn tag_key(todo_id: &TodoId, tag: &str) -> String {
    join(&[todo_id.as_str(), TAGS, &sanitize_tag(tag)])
}

/// Prefix covering all todos and tags of a list.
pub fn todos_prefix(list_id: &ListId) -> String {
    join(&[list_id.as_str(), TODOS])
}

/// Prefix covering all clients' watch counters for a list.
pub fn watch_prefix(list_id: &ListId) -> String {
    join(&[list_id.as_str(), WATCH])
}

/// One client's watch counter key for a list.
pub fn watch_key(list_id: &ListId, client_id: &ClientId) -> String {
    join(&[list_id.as_str(), WATCH, client_id.as_str()])
}

/// True if the key is a bare list key (contains no separator).
pub fn is_list_key(key: &str) -> bool {
    !key.contains(SEP)
}

/// Strip a tag down to `[A-Za-z0-9_-]`.
///
/// Characters outside the allowed set are dropped, and the separator is
/// always dropped. An empty result means the tag must not be written.
pub fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| c.is_ascii_alphanumeric() || TAG_PUNCTUATION.contains(c))
        .filter(|c| *c != SEP)
        .collect()
}

/// Entity kind of a key, by segment count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// `<listId>`
    List,
    /// `<listId>.<ns>.<id>`
    Todo,
    /// `<listId>.todos.<id>.tags.<tag>`
    Tag,
}

impl KeyKind {
    /// Classify a key. Fails on any other segment count or empty segments.
    pub fn classify(key: &str) -> Result<Self, CoreError> {
        let parts: Vec<&str> = key.split(SEP).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CoreError::malformed(key));
        }
        match parts.len() {
            1 => Ok(KeyKind::List),
            3 => Ok(KeyKind::Todo),
            5 => Ok(KeyKind::Tag),
            _ => Err(CoreError::malformed(key)),
        }
    }
}

/// List that a list, todo or tag key belongs to.
pub fn key_to_list_id(key: &str) -> Result<ListId, CoreError> {
    KeyKind::classify(key)?;
    let list = key.split(SEP).next().unwrap_or(key);
    Ok(ListId::new(list))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===========================================
    // Key Construction Tests
    // ===========================================

    #[test]
    fn list_key_has_no_separator() {
        let id = new_list_key();
        assert!(is_list_key(id.as_str()));
        assert_eq!(KeyKind::classify(id.as_str()).unwrap(), KeyKind::List);
    }

    #[test]
    fn todo_key_is_under_list() {
        let list = ListId::new("L1");
        let todo = new_todo_key(&list);
        assert!(todo.as_str().starts_with("L1.todos."));
        assert_eq!(KeyKind::classify(todo.as_str()).unwrap(), KeyKind::Todo);
        assert!(todo.as_str().starts_with(&todos_prefix(&list)));
    }

    #[test]
    fn todo_keys_are_unique() {
        let list = ListId::new("L1");
        assert_ne!(new_todo_key(&list), new_todo_key(&list));
    }

    #[test]
    fn tag_key_shape() {
        let todo = TodoId::new("L1.todos.T1");
        assert_eq!(tag_key(&todo, "x"), "L1.todos.T1.tags.x");
        assert_eq!(KeyKind::classify(&tag_key(&todo, "x")).unwrap(), KeyKind::Tag);
    }

    #[test]
    fn tag_key_sanitizes() {
        let todo = TodoId::new("L1.todos.T1");
        assert_eq!(tag_key(&todo, "a.b c!"), "L1.todos.T1.tags.abc");
    }

    #[test]
    fn watch_keys() {
        let list = ListId::new("L1");
        let client = ClientId::new("C1");
        assert_eq!(watch_prefix(&list), "L1.watch");
        assert_eq!(watch_key(&list, &client), "L1.watch.C1");
        assert_eq!(key_to_list_id("L1.watch.C1").unwrap(), list);
    }

    // ===========================================
    // Classification Tests
    // ===========================================

    #[test]
    fn key_to_list_id_by_segment_count() {
        assert_eq!(key_to_list_id("L1").unwrap(), ListId::new("L1"));
        assert_eq!(key_to_list_id("L1.todos.T1").unwrap(), ListId::new("L1"));
        assert_eq!(
            key_to_list_id("L1.todos.T1.tags.x").unwrap(),
            ListId::new("L1")
        );
    }

    #[test]
    fn two_segments_is_malformed() {
        let err = key_to_list_id("a.b").unwrap_err();
        assert!(matches!(err, CoreError::MalformedKey { ref key } if key == "a.b"));
    }

    #[test]
    fn four_and_six_segments_are_malformed() {
        assert!(key_to_list_id("a.b.c.d").is_err());
        assert!(key_to_list_id("a.b.c.d.e.f").is_err());
    }

    #[test]
    fn empty_segments_are_malformed() {
        assert!(KeyKind::classify("").is_err());
        assert!(KeyKind::classify("L1..T1").is_err());
        assert!(KeyKind::classify("L1.todos.T1.tags.").is_err());
    }

    // ===========================================
    // Sanitize Tests
    // ===========================================

    #[test]
    fn sanitize_keeps_allowed_characters() {
        assert_eq!(sanitize_tag("Computer_Science-101"), "Computer_Science-101");
    }

    #[test]
    fn sanitize_strips_spaces_and_punctuation() {
        assert_eq!(sanitize_tag("Better UX"), "BetterUX");
        assert_eq!(sanitize_tag("a/b:c@d"), "abcd");
    }

    #[test]
    fn sanitize_always_strips_separator() {
        assert_eq!(sanitize_tag("v1.2.3"), "v123");
        assert_eq!(sanitize_tag("..."), "");
    }

    #[test]
    fn sanitize_drops_non_ascii() {
        assert_eq!(sanitize_tag("café"), "caf");
        assert_eq!(sanitize_tag("日本"), "");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize_tag("Full Stack.Reactivity!");
        assert_eq!(sanitize_tag(&once), once);
    }
}
