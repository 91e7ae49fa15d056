//! Dispatcher error type.

use thiserror::Error;
use todos_core::CoreError;

use crate::groups::GroupError;
use crate::store::StoreError;

/// Errors surfaced by dispatcher operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The target already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A store key does not match the key layout.
    #[error("malformed key: {key}")]
    MalformedKey {
        /// The offending key.
        key: String,
    },

    /// The store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A batch did not commit; none of its writes are visible.
    #[error("batch aborted: {0}")]
    BatchAborted(String),

    /// The operation did not finish in time.
    #[error("operation timed out")]
    Timeout,

    /// The operation is not supported.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The named target does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller lacks permission.
    #[error("permission denied: {principal} on {name}")]
    PermissionDenied {
        /// Target name.
        name: String,
        /// Principal that was refused.
        principal: String,
    },

    /// A stored record could not be encoded or decoded.
    #[error("record codec error: {0}")]
    Codec(String),

    /// The name is not a sync group name for this app.
    #[error("not a sync group name: {0}")]
    InvalidSyncGroupName(String),

    /// The invite code could not be read.
    #[error("invalid invite: {0}")]
    InvalidInvite(String),
}

impl From<StoreError> for DispatchError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { key } => DispatchError::NotFound(key),
            StoreError::AlreadyExists(what) => DispatchError::AlreadyExists(what),
            StoreError::Unavailable(reason) => DispatchError::StoreUnavailable(reason),
            StoreError::Conflict { key } => {
                DispatchError::BatchAborted(format!("concurrent write to {key}"))
            }
            StoreError::BatchClosed => DispatchError::BatchAborted("batch already closed".into()),
            StoreError::Unsupported(what) => DispatchError::Unsupported(what.to_string()),
            StoreError::Timeout => DispatchError::Timeout,
        }
    }
}

impl From<CoreError> for DispatchError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::MalformedKey { key } => DispatchError::MalformedKey { key },
            CoreError::Codec(reason) => DispatchError::Codec(reason),
            CoreError::NotASyncGroupName(name) => DispatchError::InvalidSyncGroupName(name),
            e @ (CoreError::InvalidInvite(_) | CoreError::UnsupportedInviteVersion(_)) => {
                DispatchError::InvalidInvite(e.to_string())
            }
        }
    }
}

impl From<GroupError> for DispatchError {
    fn from(e: GroupError) -> Self {
        match e {
            GroupError::AlreadyExists(name) => DispatchError::AlreadyExists(name),
            GroupError::NotFound(name) => DispatchError::NotFound(name),
            GroupError::PermissionDenied { name, principal } => {
                DispatchError::PermissionDenied { name, principal }
            }
            GroupError::Unavailable(reason) => DispatchError::StoreUnavailable(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_becomes_batch_aborted() {
        let e: DispatchError = StoreError::Conflict { key: "k".into() }.into();
        assert!(matches!(e, DispatchError::BatchAborted(ref m) if m.contains('k')));
    }

    #[test]
    fn core_errors_keep_their_kind() {
        let e: DispatchError = CoreError::MalformedKey { key: "a.b".into() }.into();
        assert_eq!(e, DispatchError::MalformedKey { key: "a.b".into() });

        let e: DispatchError = CoreError::UnsupportedInviteVersion(9).into();
        assert!(matches!(e, DispatchError::InvalidInvite(_)));
    }

    #[test]
    fn group_errors_map_to_dispatch_errors() {
        let e: DispatchError = GroupError::AlreadyExists("sg".into()).into();
        assert_eq!(e, DispatchError::AlreadyExists("sg".into()));
        assert_eq!(e.to_string(), "already exists: sg");
    }
}
