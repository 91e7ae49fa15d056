//! Sync-group naming and invite codes.
//!
//! A list's sync-group name is derived from the list id alone, so any peer
//! holding the id computes the same name without a lookup:
//!
//! ```text
//! <serviceRoot>/$sync/<app>/<database>/<table>/<listId>
//! ```
//!
//! The group's single synced prefix is `<table>:<listId>`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use todos_types::ListId;

use crate::error::CoreError;

/// Reserved naming segment marking a sync-group name.
pub const SYNC_SEGMENT: &str = "$sync";

/// Derives sync-group names and prefixes for one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncGroupNaming {
    service_root: String,
    marker: String,
    table: String,
}

impl SyncGroupNaming {
    /// Create naming rules for a store address and its app/database/table.
    pub fn new(service_root: &str, app: &str, database: &str, table: &str) -> Self {
        Self {
            service_root: service_root.trim_end_matches('/').to_string(),
            marker: format!("/{SYNC_SEGMENT}/{app}/{database}/{table}/"),
            table: table.to_string(),
        }
    }

    /// Sync-group name for a list.
    pub fn list_id_to_sg_name(&self, list_id: &ListId) -> String {
        format!("{}{}{}", self.service_root, self.marker, list_id)
    }

    /// List id embedded in a sync-group name.
    ///
    /// Accepts names rooted at any service, matching on the last `$sync`
    /// marker, so names received from peers resolve too.
    pub fn sg_name_to_list_id(&self, sg_name: &str) -> Result<ListId, CoreError> {
        sg_name
            .rfind(self.marker.as_str())
            .map(|at| &sg_name[at + self.marker.len()..])
            .filter(|id| !id.is_empty() && !id.contains('/'))
            .map(ListId::new)
            .ok_or_else(|| CoreError::NotASyncGroupName(sg_name.to_string()))
    }

    /// Synced prefix for a list: `<table>:<listId>`.
    pub fn prefix_for(&self, list_id: &ListId) -> String {
        format!("{}:{}", self.table, list_id)
    }

    /// List id a synced prefix refers to, if it is in this table.
    pub fn list_id_from_prefix(&self, prefix: &str) -> Option<ListId> {
        prefix
            .strip_prefix(self.table.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .map(ListId::new)
    }
}

/// Shareable invite for a list's sync group.
///
/// Encoded as URL-safe base64 JSON so it fits in a link or QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListInvite {
    /// Payload version.
    pub version: u32,
    /// Full sync-group name to join.
    pub sg_name: String,
}

impl ListInvite {
    /// Current payload version.
    pub const VERSION: u32 = 1;

    /// Create an invite for a sync group.
    pub fn new(sg_name: impl Into<String>) -> Self {
        Self {
            version: Self::VERSION,
            sg_name: sg_name.into(),
        }
    }

    /// Encode as an invite code.
    pub fn to_code(&self) -> String {
        // Serializing a struct of a u32 and a String cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode an invite code.
    pub fn from_code(code: &str) -> Result<Self, CoreError> {
        let json = URL_SAFE_NO_PAD
            .decode(code.trim())
            .map_err(|e| CoreError::InvalidInvite(e.to_string()))?;
        let invite: Self =
            serde_json::from_slice(&json).map_err(|e| CoreError::InvalidInvite(e.to_string()))?;
        if invite.version != Self::VERSION {
            return Err(CoreError::UnsupportedInviteVersion(invite.version));
        }
        Ok(invite)
    }
}
