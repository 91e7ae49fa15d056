//! Sharing (sync) group types.
//!
//! A sync group is a named, permissioned scope over one list's key prefix.
//! It lives outside the key space, addressed by name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capability granted to principals of a sync group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Administer the group.
    Admin,
    /// Read synced data (required to join).
    Read,
    /// Write synced data.
    Write,
    /// Resolve conflicts.
    Resolve,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 4] = [Role::Admin, Role::Read, Role::Write, Role::Resolve];
}

/// Principals granted a role.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessList {
    /// Principal names that hold the role.
    #[serde(rename = "in")]
    pub allowed: Vec<String>,
}

impl AccessList {
    /// Check whether a principal holds the role.
    pub fn includes(&self, principal: &str) -> bool {
        self.allowed.iter().any(|p| p == principal)
    }
}

/// Specification of a sync group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncGroupSpec {
    /// Role → principals.
    pub perms: BTreeMap<Role, AccessList>,
    /// Synced prefixes, each `<table>:<keyPrefix>`.
    pub prefixes: Vec<String>,
    /// Rendezvous mount tables.
    pub mount_tables: Vec<String>,
}

impl SyncGroupSpec {
    /// Build a spec granting every role to the same member set.
    pub fn grant_all(members: &[String], prefix: String, mount_tables: Vec<String>) -> Self {
        let perms = Role::ALL
            .iter()
            .map(|role| {
                (
                    *role,
                    AccessList {
                        allowed: members.to_vec(),
                    },
                )
            })
            .collect();
        Self {
            perms,
            prefixes: vec![prefix],
            mount_tables,
        }
    }

    /// Check whether a principal holds a role.
    pub fn allows(&self, role: Role, principal: &str) -> bool {
        self.perms
            .get(&role)
            .map(|acl| acl.includes(principal))
            .unwrap_or(false)
    }
}

/// Per-member sync settings supplied when creating or joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    /// Relative sync priority of this member.
    pub sync_priority: u8,
}

impl Default for MemberInfo {
    fn default() -> Self {
        Self { sync_priority: 8 }
    }
}

/// A sync group as attached to a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncGroup {
    /// Full group name.
    pub name: String,
    /// Group specification.
    pub spec: SyncGroupSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members() -> Vec<String> {
        vec!["alice".to_string(), "bob".to_string()]
    }

    #[test]
    fn grant_all_covers_every_role() {
        let spec = SyncGroupSpec::grant_all(&members(), "tb:L".into(), vec![]);
        for role in Role::ALL {
            assert!(spec.allows(role, "alice"));
            assert!(spec.allows(role, "bob"));
            assert!(!spec.allows(role, "mallory"));
        }
        assert_eq!(spec.prefixes, vec!["tb:L"]);
    }

    #[test]
    fn missing_role_denies() {
        let mut spec = SyncGroupSpec::grant_all(&members(), "tb:L".into(), vec![]);
        spec.perms.remove(&Role::Write);
        assert!(!spec.allows(Role::Write, "alice"));
    }

    #[test]
    fn access_list_serializes_as_in() {
        let acl = AccessList {
            allowed: vec!["alice".into()],
        };
        let json = serde_json::to_string(&acl).unwrap();
        assert_eq!(json, r#"{"in":["alice"]}"#);
    }

    #[test]
    fn default_member_info_priority() {
        assert_eq!(MemberInfo::default().sync_priority, 8);
    }
}
