//! Error types for todos-core.

use thiserror::Error;

/// Errors from pure key and record handling.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A key could not be classified as list, todo or tag.
    #[error("malformed key: {key}")]
    MalformedKey {
        /// The offending key.
        key: String,
    },

    /// A stored record could not be encoded or decoded.
    #[error("record codec error: {0}")]
    Codec(String),

    /// A name is not a sync-group name for this store.
    #[error("not a sync group name: {0}")]
    NotASyncGroupName(String),

    /// An invite code could not be decoded.
    #[error("invalid invite code: {0}")]
    InvalidInvite(String),

    /// An invite code has an unknown version.
    #[error("unsupported invite version: {0}")]
    UnsupportedInviteVersion(u32),
}

impl CoreError {
    pub(crate) fn malformed(key: &str) -> Self {
        CoreError::MalformedKey {
            key: key.to_string(),
        }
    }
}
