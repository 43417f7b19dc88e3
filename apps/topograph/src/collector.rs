//! # Snapshot Collector
//!
//! Runs the three `ceph` commands, decodes their JSON into typed records,
//! encodes each snapshot and attaches the blob to the host node. Attaching
//! raises a node update, which is what drives the synchronizer.
//!
//! A failed command or unparsable output leaves that kind's attribute
//! untouched for the cycle; the other kinds are still collected.

use crate::runner::CommandRunner;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use topograph_core::{NodeId, Snapshot, SnapshotKind, TopologyError, TopologyGraph, encode_snapshot};
use tracing::{debug, info, warn};

/// Arguments passed to the ceph binary for each kind.
#[must_use]
pub fn ceph_args(kind: SnapshotKind) -> &'static [&'static str] {
    match kind {
        SnapshotKind::Cluster => &["-s", "-f", "json"],
        SnapshotKind::Osd => &["osd", "metadata", "-f", "json"],
        SnapshotKind::Mon => &["mon", "metadata", "-f", "json"],
    }
}

/// Outcome of one collection cycle.
#[derive(Debug, Default)]
pub struct CollectionReport {
    pub attached: Vec<SnapshotKind>,
    pub failed: Vec<(SnapshotKind, TopologyError)>,
}

pub struct Collector<G, R> {
    graph: Arc<G>,
    runner: Arc<R>,
    host: NodeId,
    ceph_binary: String,
}

impl<G, R> Collector<G, R>
where
    G: TopologyGraph + 'static,
    R: CommandRunner + 'static,
{
    pub fn new(graph: Arc<G>, runner: Arc<R>, host: NodeId, ceph_binary: impl Into<String>) -> Self {
        Self {
            graph,
            runner,
            host,
            ceph_binary: ceph_binary.into(),
        }
    }

    /// Run one command and encode its output.
    pub async fn snapshot(&self, kind: SnapshotKind) -> Result<String, TopologyError> {
        let stdout = self.runner.run(&self.ceph_binary, ceph_args(kind)).await?;
        let snapshot = Snapshot::from_json(kind, &stdout)?;
        encode_snapshot(&snapshot)
    }

    /// Collect every kind once, cluster summary first.
    pub async fn collect_once(&self) -> CollectionReport {
        let mut report = CollectionReport::default();
        for kind in SnapshotKind::ALL {
            let attached = match self.snapshot(kind).await {
                Ok(blob) => self
                    .graph
                    .set_attribute(&self.host, kind.attribute_key(), Value::String(blob)),
                Err(e) => Err(e),
            };
            match attached {
                Ok(()) => {
                    debug!("{}: attached {} snapshot", self.host, kind);
                    report.attached.push(kind);
                }
                Err(e) => {
                    warn!("{}: {} snapshot skipped: {}", self.host, kind, e);
                    report.failed.push((kind, e));
                }
            }
        }
        report
    }

    /// Collect every `interval` until the handle is stopped. The first
    /// cycle runs one `interval` from now.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> CollectorHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let report = self.collect_once().await;
                        debug!(
                            "{}: collection cycle, {} attached, {} failed",
                            self.host,
                            report.attached.len(),
                            report.failed.len()
                        );
                    }
                }
            }
        });
        info!("Collector ticking every {}s", interval.as_secs());

        CollectorHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Handle on a spawned collector.
#[derive(Debug)]
pub struct CollectorHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl CollectorHandle {
    /// Stop ticking and wait for the running cycle to finish.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("Collector task ended abnormally: {}", e);
        }
        info!("Collector stopped");
    }

    /// True once the ticking task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
