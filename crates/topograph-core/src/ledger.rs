//! # Rendered-Version Ledger
//!
//! Change detection for snapshot blobs.
//!
//! The ledger remembers, per cluster identity and snapshot kind, the last
//! blob that was rendered *completely*. Blob equality stands in for
//! "external state unchanged since the last successful render". The cluster
//! summary renders one node per reporting host, so its entries are also
//! keyed by reporter.
//!
//! The ledger is process-local and volatile: after a restart every identity
//! is rendered once more, which is safe because rendering upserts by key.

use crate::NodeId;
use crate::ceph::SnapshotKind;
use std::collections::{BTreeMap, BTreeSet};

/// Ledger key: cluster identity (fsid), object kind and, for kinds rendered
/// once per reporting host, the reporter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LedgerKey {
    identity: String,
    kind: SnapshotKind,
    reporter: Option<NodeId>,
}

impl LedgerKey {
    /// Key of `kind` for `identity` as seen from `reporter`. The reporter is
    /// dropped for kinds shared by every host of the cluster.
    #[must_use]
    pub fn new(identity: &str, kind: SnapshotKind, reporter: &NodeId) -> Self {
        Self {
            identity: identity.to_string(),
            kind,
            reporter: kind.per_reporter().then(|| reporter.clone()),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub fn kind(&self) -> SnapshotKind {
        self.kind
    }
}

/// Synchronization state of one ledger key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing rendered completely yet.
    Unsynced,
    /// A render pass is in progress.
    Rendering,
    /// The given blob is fully rendered.
    Synced(String),
}

/// The Rendered-Version Ledger.
#[derive(Debug, Clone, Default)]
pub struct RenderLedger {
    rendered: BTreeMap<LedgerKey, String>,
    in_flight: BTreeSet<LedgerKey>,
}

impl RenderLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `blob` is exactly the last fully rendered version.
    ///
    /// A key never rendered is absent and always triggers a render.
    #[must_use]
    pub fn is_rendered(&self, key: &LedgerKey, blob: &str) -> bool {
        self.rendered.get(key).is_some_and(|last| last == blob)
    }

    /// Mark a pass as started. Returns `false` if one is already running.
    pub fn begin(&mut self, key: &LedgerKey) -> bool {
        self.in_flight.insert(key.clone())
    }

    /// Finish a pass. Only a complete pass advances the ledger; an
    /// incomplete one leaves the previous entry exactly as it was.
    pub fn finish(&mut self, key: &LedgerKey, blob: &str, complete: bool) {
        self.in_flight.remove(key);
        if complete {
            self.rendered.insert(key.clone(), blob.to_string());
        }
    }

    /// Forget every kind and reporter rendered for `identity`.
    pub fn clear(&mut self, identity: &str) {
        self.rendered.retain(|key, _| key.identity != identity);
    }

    /// Current state of one key.
    #[must_use]
    pub fn state(&self, key: &LedgerKey) -> SyncState {
        if self.in_flight.contains(key) {
            return SyncState::Rendering;
        }
        match self.rendered.get(key) {
            Some(blob) => SyncState::Synced(blob.clone()),
            None => SyncState::Unsynced,
        }
    }

    /// Number of keys fully rendered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    /// True when nothing has been rendered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(identity: &str, kind: SnapshotKind) -> LedgerKey {
        LedgerKey::new(identity, kind, &NodeId::new("host-1"))
    }

    #[test]
    fn unknown_identity_is_not_rendered() {
        let ledger = RenderLedger::new();
        assert!(!ledger.is_rendered(&key("fsid", SnapshotKind::Osd), ""));
        assert_eq!(ledger.state(&key("fsid", SnapshotKind::Osd)), SyncState::Unsynced);
    }

    #[test]
    fn complete_pass_advances() {
        let mut ledger = RenderLedger::new();
        let osd = key("fsid", SnapshotKind::Osd);
        assert!(ledger.begin(&osd));
        assert!(!ledger.begin(&osd));
        assert_eq!(ledger.state(&osd), SyncState::Rendering);

        ledger.finish(&osd, "v1", true);
        assert!(ledger.is_rendered(&osd, "v1"));
        assert!(!ledger.is_rendered(&osd, "v2"));
        assert!(!ledger.is_rendered(&key("fsid", SnapshotKind::Mon), "v1"));
    }

    #[test]
    fn incomplete_pass_leaves_entry_untouched() {
        let mut ledger = RenderLedger::new();
        let mon = key("fsid", SnapshotKind::Mon);
        ledger.finish(&mon, "v1", true);

        ledger.begin(&mon);
        ledger.finish(&mon, "v2", false);

        assert_eq!(ledger.state(&mon), SyncState::Synced("v1".into()));
        assert!(!ledger.is_rendered(&mon, "v2"));
    }

    #[test]
    fn cluster_kind_is_scoped_by_reporter() {
        let first = NodeId::new("host-1");
        let second = NodeId::new("host-2");
        assert_ne!(
            LedgerKey::new("fsid", SnapshotKind::Cluster, &first),
            LedgerKey::new("fsid", SnapshotKind::Cluster, &second)
        );
        assert_eq!(
            LedgerKey::new("fsid", SnapshotKind::Osd, &first),
            LedgerKey::new("fsid", SnapshotKind::Osd, &second)
        );
    }

    #[test]
    fn clear_drops_all_kinds_and_reporters_of_identity() {
        let mut ledger = RenderLedger::new();
        for reporter in ["host-1", "host-2"] {
            let cluster = LedgerKey::new("a", SnapshotKind::Cluster, &NodeId::new(reporter));
            ledger.finish(&cluster, "v", true);
        }
        ledger.finish(&key("a", SnapshotKind::Osd), "v", true);
        ledger.finish(&key("b", SnapshotKind::Osd), "v", true);

        ledger.clear("a");
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_rendered(&key("b", SnapshotKind::Osd), "v"));
        assert!(!ledger.is_rendered(&key("a", SnapshotKind::Osd), "v"));
    }
}
