//! # todos-core
//!
//! Pure logic for todos-sync (no I/O, instant tests).
//!
//! Lists, todos and tags share one flat, lexicographically sorted key space:
//!
//! ```text
//! <listId>                          list   {name}
//! <listId>.todos.<uid>              todo   {text, done, timestamp}
//! <listId>.todos.<uid>.tags.<tag>   tag    (empty; existence is the payload)
//! <listId>.watch.<clientId>         watch  per-client write counter
//! ```
//!
//! This crate computes and classifies those keys, reconstructs todos from an
//! ordered scan, derives watch fingerprints, and names sync groups. The
//! store I/O is performed by `todos-client`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assemble;
pub mod codec;
pub mod error;
pub mod fingerprint;
pub mod keys;
pub mod naming;

pub use assemble::TodoAssembler;
pub use codec::{decode_seq, encode_seq, marshal, unmarshal};
pub use error::CoreError;
pub use fingerprint::{version_string, watch_key_client, ChangeDetector, VersionMap};
pub use keys::{
    is_list_key, join, key_to_list_id, new_list_key, new_todo_key, sanitize_tag, tag_key,
    todos_prefix, watch_key, watch_prefix, KeyKind, SEP,
};
pub use naming::{ListInvite, SyncGroupNaming, SYNC_SEGMENT};
