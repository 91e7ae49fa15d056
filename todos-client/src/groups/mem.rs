//! In-memory sync group registry.

use super::{GroupError, SyncGroups};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use todos_types::{MemberInfo, Role, SyncGroupSpec};

/// A stored group: its spec and member table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Group specification.
    pub spec: SyncGroupSpec,
    /// Members by principal.
    #[serde(default)]
    pub members: BTreeMap<String, MemberInfo>,
}

/// In-memory registry.
///
/// Each handle acts as one principal; [`MemSyncGroups::as_principal`] gives
/// a handle for another principal over the same registry.
#[derive(Debug, Clone)]
pub struct MemSyncGroups {
    principal: String,
    groups: Arc<DashMap<String, GroupRecord>>,
}

impl MemSyncGroups {
    /// Create an empty registry, acting as `principal`.
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            groups: Arc::new(DashMap::new()),
        }
    }

    /// Create a registry pre-filled with groups.
    pub fn from_records(
        principal: impl Into<String>,
        records: BTreeMap<String, GroupRecord>,
    ) -> Self {
        let registry = Self::new(principal);
        for (name, record) in records {
            registry.groups.insert(name, record);
        }
        registry
    }

    /// A handle acting as another principal.
    pub fn as_principal(&self, principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            groups: Arc::clone(&self.groups),
        }
    }

    /// Principal this handle acts as.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Copy of every group.
    pub fn snapshot(&self) -> BTreeMap<String, GroupRecord> {
        self.groups
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[async_trait]
impl SyncGroups for MemSyncGroups {
    async fn create(
        &self,
        name: &str,
        spec: SyncGroupSpec,
        info: MemberInfo,
    ) -> Result<(), GroupError> {
        match self.groups.entry(name.to_string()) {
            Entry::Occupied(_) => Err(GroupError::AlreadyExists(name.to_string())),
            Entry::Vacant(slot) => {
                let mut members = BTreeMap::new();
                members.insert(self.principal.clone(), info);
                slot.insert(GroupRecord { spec, members });
                Ok(())
            }
        }
    }

    async fn join(&self, name: &str, info: MemberInfo) -> Result<SyncGroupSpec, GroupError> {
        let mut record = self
            .groups
            .get_mut(name)
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;
        if !record.members.contains_key(&self.principal)
            && !record.spec.allows(Role::Read, &self.principal)
        {
            return Err(GroupError::PermissionDenied {
                name: name.to_string(),
                principal: self.principal.clone(),
            });
        }
        record.members.entry(self.principal.clone()).or_insert(info);
        Ok(record.spec.clone())
    }

    async fn get_spec(&self, name: &str) -> Result<SyncGroupSpec, GroupError> {
        self.groups
            .get(name)
            .map(|record| record.spec.clone())
            .ok_or_else(|| GroupError::NotFound(name.to_string()))
    }

    async fn get_members(&self, name: &str) -> Result<BTreeMap<String, MemberInfo>, GroupError> {
        self.groups
            .get(name)
            .map(|record| record.members.clone())
            .ok_or_else(|| GroupError::NotFound(name.to_string()))
    }

    async fn list_names(&self) -> Result<Vec<String>, GroupError> {
        let mut names: Vec<String> = self.groups.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_for(members: &[&str]) -> SyncGroupSpec {
        let members: Vec<String> = members.iter().map(|m| m.to_string()).collect();
        SyncGroupSpec::grant_all(&members, "tb:L1".into(), vec!["/mt/rendezvous".into()])
    }

    #[tokio::test]
    async fn create_then_read_back() {
        let groups = MemSyncGroups::new("alice");
        groups
            .create("sg", spec_for(&["alice", "bob"]), MemberInfo::default())
            .await
            .unwrap();

        assert_eq!(groups.get_spec("sg").await.unwrap(), spec_for(&["alice", "bob"]));
        let members = groups.get_members("sg").await.unwrap();
        assert_eq!(members.keys().collect::<Vec<_>>(), vec!["alice"]);
        assert_eq!(groups.list_names().await.unwrap(), vec!["sg"]);
    }

    #[tokio::test]
    async fn create_twice_fails() {
        let groups = MemSyncGroups::new("alice");
        groups
            .create("sg", spec_for(&["alice"]), MemberInfo::default())
            .await
            .unwrap();
        let err = groups
            .create("sg", spec_for(&["alice"]), MemberInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err, GroupError::AlreadyExists("sg".into()));
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let alice = MemSyncGroups::new("alice");
        let bob = alice.as_principal("bob");
        alice
            .create("sg", spec_for(&["alice", "bob"]), MemberInfo::default())
            .await
            .unwrap();

        bob.join("sg", MemberInfo::default()).await.unwrap();
        bob.join("sg", MemberInfo { sync_priority: 1 }).await.unwrap();

        let members = alice.get_members("sg").await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members["bob"], MemberInfo::default());
    }

    #[tokio::test]
    async fn join_requires_read_role() {
        let alice = MemSyncGroups::new("alice");
        alice
            .create("sg", spec_for(&["alice"]), MemberInfo::default())
            .await
            .unwrap();

        let err = alice
            .as_principal("mallory")
            .join("sg", MemberInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GroupError::PermissionDenied { ref principal, .. } if principal == "mallory"));
    }

    #[tokio::test]
    async fn unknown_group_is_not_found() {
        let groups = MemSyncGroups::new("alice");
        assert_eq!(
            groups.join("nope", MemberInfo::default()).await.unwrap_err(),
            GroupError::NotFound("nope".into())
        );
        assert!(groups.get_spec("nope").await.is_err());
    }

    #[tokio::test]
    async fn snapshot_round_trips() {
        let groups = MemSyncGroups::new("alice");
        groups
            .create("sg", spec_for(&["alice"]), MemberInfo::default())
            .await
            .unwrap();
        let restored = MemSyncGroups::from_records("bob", groups.snapshot());
        assert_eq!(restored.get_spec("sg").await.unwrap(), spec_for(&["alice"]));
        assert_eq!(restored.principal(), "bob");
    }
}
