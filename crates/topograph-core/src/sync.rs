//! # Topology Synchronizer
//!
//! Event-driven reconciliation of Ceph snapshots into the topology graph.
//!
//! Whenever a host node carrying snapshot attributes is added or updated,
//! the synchronizer:
//! 1. Decodes the cluster summary to learn the cluster identity (fsid)
//! 2. For each kind (cluster, OSD, monitor), asks the ledger whether this
//!    exact blob was already rendered
//! 3. Otherwise renders every record: resolve the host, upsert the daemon
//!    node, link it to its owner and to the interfaces it declares
//! 4. Advances the ledger only if no record failed
//!
//! Record failures never stop a pass; the remaining records are still
//! materialized. A failed pass is retried in full on the next event.

use crate::ceph::{ClusterSummary, InterfaceLookup, InterfaceRef, Renderable, Snapshot, SnapshotKind};
use crate::formats::decode_snapshot_kind;
use crate::graph::{GraphListener, ListenerId, TopologyGraph};
use crate::ledger::{LedgerKey, RenderLedger, SyncState};
use crate::primitives::{DEVICE_TYPE, HOST_TYPE, LOOPBACK_ENCAP, SOCKET_EDGE_TYPE};
use crate::{Filter, Ipv4Cidr, Metadata, Node, NodeId, TopologyError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// PASS RESULTS
// =============================================================================

/// A record that could not be fully rendered.
#[derive(Debug)]
pub struct RecordFailure {
    /// `host/name` of the record.
    pub record: String,
    pub error: TopologyError,
}

/// Result of rendering every record of one snapshot.
#[derive(Debug, Default)]
pub struct PassOutcome {
    /// Nodes created or updated, including partially linked ones.
    pub rendered: Vec<NodeId>,
    /// Records without a host field.
    pub skipped: usize,
    pub failed: Vec<RecordFailure>,
}

impl PassOutcome {
    /// A pass is complete when no record failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What happened to one snapshot kind during a synchronization.
#[derive(Debug)]
pub enum PassStatus {
    /// The node carries no snapshot of this kind.
    Absent,
    /// The snapshot attribute could not be decoded.
    Undecodable(TopologyError),
    /// The ledger already holds this exact blob.
    AlreadyRendered,
    /// Another pass for the same identity and kind is running.
    InFlight,
    /// The snapshot holds no record.
    Empty,
    /// Every record rendered; the ledger advanced.
    Complete(PassOutcome),
    /// Some records failed; the ledger is untouched.
    Partial(PassOutcome),
}

/// Result of [`Synchronizer::synchronize`].
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Cluster identity, when a usable summary was found.
    pub identity: Option<String>,
    pub passes: Vec<(SnapshotKind, PassStatus)>,
}

impl SyncReport {
    /// Status of one kind, if it was examined.
    #[must_use]
    pub fn status(&self, kind: SnapshotKind) -> Option<&PassStatus> {
        self.passes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, status)| status)
    }

    /// Nodes rendered by this synchronization, across kinds.
    #[must_use]
    pub fn rendered(&self) -> Vec<&NodeId> {
        self.passes
            .iter()
            .filter_map(|(_, status)| match status {
                PassStatus::Complete(outcome) | PassStatus::Partial(outcome) => {
                    Some(outcome.rendered.iter())
                }
                _ => None,
            })
            .flatten()
            .collect()
    }
}

// =============================================================================
// SYNCHRONIZER
// =============================================================================

/// Renders Ceph snapshots attached to host nodes into the graph.
///
/// Constructed with the graph it renders into; [`Synchronizer::start`]
/// subscribes it to that graph's node events and [`Synchronizer::stop`]
/// unsubscribes it.
pub struct Synchronizer<G: TopologyGraph> {
    graph: Arc<G>,
    ledger: Mutex<RenderLedger>,
    /// Last cluster summary seen per reporting host node.
    tracked: Mutex<BTreeMap<NodeId, ClusterSummary>>,
    subscription: Mutex<Option<ListenerId>>,
}

impl<G: TopologyGraph + 'static> Synchronizer<G> {
    /// Create a synchronizer for `graph`. It does not listen until started.
    pub fn new(graph: Arc<G>) -> Arc<Self> {
        Arc::new(Self {
            graph,
            ledger: Mutex::new(RenderLedger::new()),
            tracked: Mutex::new(BTreeMap::new()),
            subscription: Mutex::new(None),
        })
    }

    /// Subscribe to node events. Calling it twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut subscription = lock(&self.subscription);
        if subscription.is_none() {
            let listener: Arc<dyn GraphListener> = self.clone();
            *subscription = Some(self.graph.subscribe(listener));
            info!("Ceph topology synchronizer started");
        }
    }

    /// Unsubscribe from node events. A pass already running completes.
    pub fn stop(&self) {
        if let Some(id) = lock(&self.subscription).take() {
            self.graph.unsubscribe(id);
            info!("Ceph topology synchronizer stopped");
        }
    }

    /// State of one identity and kind as seen from `reporter`.
    #[must_use]
    pub fn state(&self, identity: &str, kind: SnapshotKind, reporter: &NodeId) -> SyncState {
        lock(&self.ledger).state(&LedgerKey::new(identity, kind, reporter))
    }

    /// Last cluster summary reported by a host node.
    #[must_use]
    pub fn tracked_cluster(&self, reporter: &NodeId) -> Option<ClusterSummary> {
        lock(&self.tracked).get(reporter).cloned()
    }

    /// Forget everything rendered for a cluster identity.
    pub fn invalidate(&self, identity: &str) {
        lock(&self.ledger).clear(identity);
    }

    /// Render every snapshot carried by `node` that is not rendered yet.
    pub fn synchronize(&self, node: &Node) -> SyncReport {
        let mut report = SyncReport::default();

        let summary = match cluster_summary(node) {
            None => return report,
            Some(Err(e)) => {
                error!("{}: {}", node.id, e);
                report
                    .passes
                    .push((SnapshotKind::Cluster, PassStatus::Undecodable(e)));
                return report;
            }
            Some(Ok(summary)) => summary,
        };
        if summary.fsid.is_empty() {
            debug!("{}: cluster summary without fsid, nothing to render", node.id);
            return report;
        }

        let identity = summary.fsid.clone();
        let reporter = node.get_str("Name").unwrap_or_default();
        lock(&self.tracked).insert(node.id.clone(), summary.clone());

        for kind in SnapshotKind::ALL {
            let status = self.render_kind(node, &identity, reporter, kind, &summary);
            report.passes.push((kind, status));
        }
        report.identity = Some(identity);
        report
    }

    fn render_kind(
        &self,
        node: &Node,
        identity: &str,
        reporter: &str,
        kind: SnapshotKind,
        summary: &ClusterSummary,
    ) -> PassStatus {
        let Some(blob) = node.get_str(kind.attribute_key()) else {
            return PassStatus::Absent;
        };

        let key = LedgerKey::new(identity, kind, &node.id);
        {
            let mut ledger = lock(&self.ledger);
            if ledger.is_rendered(&key, blob) {
                debug!("Cluster ceph {} {} is already graphed", identity, kind);
                return PassStatus::AlreadyRendered;
            }
            if !ledger.begin(&key) {
                debug!("Cluster ceph {} {} is being graphed", identity, kind);
                return PassStatus::InFlight;
            }
        }

        let outcome = match kind {
            SnapshotKind::Cluster => Ok(self.render_records(reporter, std::slice::from_ref(summary))),
            _ => decode_snapshot_kind(blob, kind).map(|snapshot| match snapshot {
                Snapshot::Cluster(s) => self.render_records(reporter, std::slice::from_ref(&s)),
                Snapshot::Osds(osds) => self.render_records(reporter, &osds),
                Snapshot::Mons(mons) => self.render_records(reporter, &mons),
            }),
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("{}: {} snapshot: {}", node.id, kind, e);
                lock(&self.ledger).finish(&key, blob, false);
                return PassStatus::Undecodable(e);
            }
        };

        if outcome.rendered.is_empty() && outcome.failed.is_empty() && outcome.skipped == 0 {
            lock(&self.ledger).finish(&key, blob, false);
            debug!("Cluster ceph {}: no {} record to render", identity, kind);
            return PassStatus::Empty;
        }

        let complete = outcome.is_complete();
        lock(&self.ledger).finish(&key, blob, complete);

        if complete {
            info!("Ceph cluster {} {} is rendered", identity, kind);
            PassStatus::Complete(outcome)
        } else {
            let partial = TopologyError::PartialRender {
                identity: identity.to_string(),
                kind: kind.to_string(),
                failed: outcome.failed.len(),
            };
            warn!("{}", partial);
            PassStatus::Partial(outcome)
        }
    }

    /// Render every record, collecting successes and failures.
    fn render_records<R: Renderable>(&self, reporter: &str, records: &[R]) -> PassOutcome {
        records.iter().fold(PassOutcome::default(), |mut outcome, record| {
            let host = record.hostname(reporter);
            if host.is_empty() {
                outcome.skipped += 1;
                return outcome;
            }

            let label = format!("{}/{}", host, record.display_name());
            match self.render_record(host, record) {
                Ok((id, unresolved)) => {
                    outcome.rendered.push(id);
                    outcome
                        .failed
                        .extend(unresolved.into_iter().map(|error| RecordFailure {
                            record: label.clone(),
                            error,
                        }));
                }
                Err(error) => {
                    error!("{}", error);
                    outcome.failed.push(RecordFailure {
                        record: label,
                        error,
                    });
                }
            }
            outcome
        })
    }

    /// Upsert one record's node and its edges.
    ///
    /// `Err` means no node was written. `Ok` carries the node and the
    /// interface references that could not be linked.
    fn render_record<R: Renderable>(
        &self,
        host: &str,
        record: &R,
    ) -> Result<(NodeId, Vec<TopologyError>), TopologyError> {
        let host_node = self
            .graph
            .lookup_first_node(&Filter::And(vec![
                Filter::term("Name", host),
                Filter::term("Type", HOST_TYPE),
            ]))?
            .ok_or_else(|| TopologyError::HostNotFound(host.to_string()))?;

        let metadata = record.metadata()?;
        let name = record.display_name();

        info!("{}: Adding {} {}", host, R::KIND, name);
        let node = self.graph.upsert_node(record.node_key(host), metadata)?;
        self.graph.add_ownership_edge(&host_node.id, &node.id)?;
        // Socket edges always mirror the record being rendered.
        let stale = self
            .graph
            .unlink(&node.id, &Filter::term("Type", SOCKET_EDGE_TYPE))?;
        if stale > 0 {
            debug!("{}: dropped {} socket edges of {}", host, stale, name);
        }

        let refs = match record.interfaces() {
            Ok(refs) => refs,
            Err(e) => {
                error!("{}: {} for {}", host, e, name);
                return Ok((node.id, vec![e]));
            }
        };

        let mut unresolved = Vec::new();
        for iface_ref in refs {
            if let Err(e) = self.link_interface(&host_node, &node.id, &iface_ref) {
                error!("{}: {} for {}", host, e, name);
                unresolved.push(e);
            }
        }
        Ok((node.id, unresolved))
    }

    fn link_interface(
        &self,
        host: &Node,
        daemon: &NodeId,
        iface_ref: &InterfaceRef,
    ) -> Result<(), TopologyError> {
        let filter = match &iface_ref.lookup {
            InterfaceLookup::Name(name) => Filter::term("Name", name.as_str()),
            // Monitors report no mask: look for a host-scope range.
            InterfaceLookup::Address(ip) => Filter::And(vec![
                Filter::term("Type", DEVICE_TYPE),
                Filter::Ipv4Range("IPV4".to_string(), Ipv4Cidr::host(*ip)),
                Filter::not(Filter::term("EncapType", LOOPBACK_ENCAP)),
            ]),
        };

        let iface = self
            .graph
            .lookup_first_child(&host.id, &filter)?
            .ok_or_else(|| TopologyError::InterfaceNotFound {
                host: host.get_str("Name").unwrap_or_default().to_string(),
                reference: iface_ref.to_string(),
            })?;

        debug!(
            "Connecting {} to interface {}",
            daemon,
            iface.get_str("Name").unwrap_or_default()
        );
        self.graph.link(
            daemon,
            &iface.id,
            Metadata::from_pairs([
                ("Type", Value::from(SOCKET_EDGE_TYPE)),
                ("Address", Value::from(iface_ref.address.as_str())),
                ("RelationType", Value::from(iface_ref.role)),
            ]),
        )
    }

    /// Clear the ledger of the identity `node` reported.
    fn forget(&self, node: &Node) {
        let tracked = lock(&self.tracked).remove(&node.id);
        let identity = match cluster_summary(node) {
            Some(Ok(summary)) if !summary.fsid.is_empty() => Some(summary.fsid),
            _ => tracked.map(|summary| summary.fsid),
        };
        if let Some(identity) = identity {
            info!("{}: forgetting rendered state of cluster {}", node.id, identity);
            self.invalidate(&identity);
        }
    }
}

/// Decode the cluster summary attached to `node`, if any.
fn cluster_summary(node: &Node) -> Option<Result<ClusterSummary, TopologyError>> {
    let blob = node.get_str(SnapshotKind::Cluster.attribute_key())?;
    Some(
        decode_snapshot_kind(blob, SnapshotKind::Cluster).and_then(|snapshot| match snapshot {
            Snapshot::Cluster(summary) => Ok(summary),
            other => Err(TopologyError::Decode(format!(
                "expected CLUSTER snapshot, found {}",
                other.kind()
            ))),
        }),
    )
}

impl<G: TopologyGraph + 'static> GraphListener for Synchronizer<G> {
    /// A newly appearing reporter is always rendered in full.
    fn on_node_added(&self, node: &Node) {
        if let Some(Ok(summary)) = cluster_summary(node) {
            if !summary.fsid.is_empty() {
                self.invalidate(&summary.fsid);
            }
        }
        self.synchronize(node);
    }

    fn on_node_updated(&self, node: &Node) {
        self.synchronize(node);
    }

    fn on_node_deleted(&self, node: &Node) {
        self.forget(node);
    }
}

// =============================================================================
// TESTS
// =============================================================================
