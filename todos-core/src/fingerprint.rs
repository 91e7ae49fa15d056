//! Watch fingerprints for polling-based change detection.
//!
//! Every client keeps a private counter per list under `<listId>.watch.<clientId>`
//! and bumps it on each local mutation. A poller summarizes all *other*
//! clients' counters for a list into a version string; a change in any list's
//! version string means data arrived via sync.

use std::collections::BTreeMap;
use todos_types::{ClientId, ListId};

use crate::error::CoreError;
use crate::keys::{watch_prefix, SEP};

/// List → version string, for one poll.
pub type VersionMap = BTreeMap<ListId, String>;

/// Client that owns a watch key under the given list.
pub fn watch_key_client(list_id: &ListId, key: &str) -> Result<ClientId, CoreError> {
    let prefix = watch_prefix(list_id);
    key.strip_prefix(prefix.as_str())
        .and_then(|rest| rest.strip_prefix(SEP))
        .filter(|client| !client.is_empty() && !client.contains(SEP))
        .map(ClientId::new)
        .ok_or_else(|| CoreError::MalformedKey {
            key: key.to_string(),
        })
}

/// Sorted, comma-joined `clientId:counter` pairs, excluding `own`.
pub fn version_string(counters: &BTreeMap<ClientId, String>, own: &ClientId) -> String {
    let mut pairs: Vec<String> = counters
        .iter()
        .filter(|(client, _)| *client != own)
        .map(|(client, seq)| format!("{}:{}", client, seq))
        .collect();
    pairs.sort();
    pairs.join(",")
}

/// Compares successive version maps.
///
/// The first observation never reports a change: there is nothing to compare
/// against, and reporting one would fire a spurious event on startup.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    previous: Option<VersionMap>,
}

impl ChangeDetector {
    /// Create a detector with no prior observation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current versions; returns true if they differ from the last poll.
    pub fn observe(&mut self, current: VersionMap) -> bool {
        let changed = matches!(&self.previous, Some(prev) if *prev != current);
        self.previous = Some(current);
        changed
    }

    /// Whether at least one poll has been observed.
    pub fn is_primed(&self) -> bool {
        self.previous.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(pairs: &[(&str, &str)]) -> BTreeMap<ClientId, String> {
        pairs
            .iter()
            .map(|(c, s)| (ClientId::new(*c), s.to_string()))
            .collect()
    }

    fn versions(pairs: &[(&str, &str)]) -> VersionMap {
        pairs
            .iter()
            .map(|(l, v)| (ListId::new(*l), v.to_string()))
            .collect()
    }

    // ===========================================
    // Version String Tests
    // ===========================================

    #[test]
    fn version_string_excludes_self() {
        let own = ClientId::new("me");
        let v = version_string(&counters(&[("me", "9"), ("b", "2"), ("a", "1")]), &own);
        assert_eq!(v, "a:1,b:2");
    }

    #[test]
    fn version_string_empty_when_only_self() {
        let own = ClientId::new("me");
        assert_eq!(version_string(&counters(&[("me", "3")]), &own), "");
    }

    #[test]
    fn watch_key_client_parses() {
        let list = ListId::new("L");
        assert_eq!(
            watch_key_client(&list, "L.watch.C1").unwrap(),
            ClientId::new("C1")
        );
        assert!(watch_key_client(&list, "L.watch").is_err());
        assert!(watch_key_client(&list, "L.watch.C1.x").is_err());
        assert!(watch_key_client(&list, "M.watch.C1").is_err());
    }

    // ===========================================
    // Change Detector Tests
    // ===========================================

    #[test]
    fn first_poll_never_reports() {
        let mut d = ChangeDetector::new();
        assert!(!d.is_primed());
        assert!(!d.observe(versions(&[("L", "a:1")])));
        assert!(d.is_primed());
    }

    #[test]
    fn unchanged_versions_do_not_report() {
        let mut d = ChangeDetector::new();
        d.observe(versions(&[("L", "a:1")]));
        assert!(!d.observe(versions(&[("L", "a:1")])));
    }

    #[test]
    fn bumped_counter_reports() {
        let mut d = ChangeDetector::new();
        d.observe(versions(&[("L", "a:1")]));
        assert!(d.observe(versions(&[("L", "a:2")])));
        assert!(!d.observe(versions(&[("L", "a:2")])));
    }

    #[test]
    fn new_list_reports() {
        let mut d = ChangeDetector::new();
        d.observe(versions(&[("L", "")]));
        assert!(d.observe(versions(&[("L", ""), ("M", "")])));
    }
}
