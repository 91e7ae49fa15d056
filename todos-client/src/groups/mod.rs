//! Sharing (sync) groups.
//!
//! A sync group makes one list's key prefix sync between its members. The
//! registry of groups lives outside the key space and is reached through
//! the [`SyncGroups`] trait.

mod mem;

pub use mem::{GroupRecord, MemSyncGroups};

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use todos_types::{MemberInfo, SyncGroupSpec};

/// Errors from sync group operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GroupError {
    /// A group with this name already exists.
    #[error("sync group already exists: {0}")]
    AlreadyExists(String),

    /// No group with this name.
    #[error("sync group not found: {0}")]
    NotFound(String),

    /// The principal lacks the role required for the operation.
    #[error("{principal} may not join {name}")]
    PermissionDenied {
        /// Group name.
        name: String,
        /// Principal that was refused.
        principal: String,
    },

    /// The registry could not be reached.
    #[error("sync group service unavailable: {0}")]
    Unavailable(String),
}

/// Registry of sync groups.
#[async_trait]
pub trait SyncGroups: Send + Sync {
    /// Create a group. The caller becomes its first member.
    async fn create(
        &self,
        name: &str,
        spec: SyncGroupSpec,
        info: MemberInfo,
    ) -> Result<(), GroupError>;

    /// Join an existing group. Joining twice has no further effect.
    async fn join(&self, name: &str, info: MemberInfo) -> Result<SyncGroupSpec, GroupError>;

    /// Read a group's spec.
    async fn get_spec(&self, name: &str) -> Result<SyncGroupSpec, GroupError>;

    /// Read a group's members, by principal.
    async fn get_members(&self, name: &str) -> Result<BTreeMap<String, MemberInfo>, GroupError>;

    /// Names of every group visible to the caller, ascending.
    async fn list_names(&self) -> Result<Vec<String>, GroupError>;
}
