//! # Agent
//!
//! Wires the pieces together for one host:
//!
//! ```text
//! config ─► host node ─► interfaces ─► synchronizer ─► first collection ─► ticker
//! ```
//!
//! Stopping reverses the order: the ticker stops first, then the
//! synchronizer unsubscribes.

use crate::collector::{CollectionReport, Collector, CollectorHandle};
use crate::config::AgentConfig;
use crate::host::{INSTANCE_ID_PATH, host_metadata};
use crate::interfaces;
use crate::runner::CommandRunner;
use std::path::Path;
use std::sync::Arc;
use topograph_core::{NodeId, Synchronizer, TopologyError, TopologyGraph};
use tracing::{info, warn};

pub struct Agent<G: TopologyGraph + 'static> {
    graph: Arc<G>,
    host: NodeId,
    synchronizer: Arc<Synchronizer<G>>,
    collector: CollectorHandle,
    initial: CollectionReport,
}

impl<G: TopologyGraph + 'static> Agent<G> {
    /// Bootstrap the host node and start observing the cluster.
    pub async fn start<R: CommandRunner + 'static>(
        config: &AgentConfig,
        graph: Arc<G>,
        runner: Arc<R>,
    ) -> Result<Self, TopologyError> {
        Self::start_with_instance_id(config, graph, runner, Path::new(INSTANCE_ID_PATH)).await
    }

    /// [`Agent::start`] reading the cloud instance id from `instance_id_path`.
    pub async fn start_with_instance_id<R: CommandRunner + 'static>(
        config: &AgentConfig,
        graph: Arc<G>,
        runner: Arc<R>,
        instance_id_path: &Path,
    ) -> Result<Self, TopologyError> {
        let metadata = host_metadata(config, runner.as_ref(), instance_id_path).await;
        let host = graph
            .upsert_node(NodeId::new(config.host_id.clone()), metadata)?
            .id;
        info!("Host node {} registered", host);

        if config.discover_interfaces {
            match interfaces::discover() {
                Ok(found) => {
                    let ids = interfaces::register(graph.as_ref(), &host, &config.host_id, &found)?;
                    info!("{}: {} interfaces registered", host, ids.len());
                }
                Err(e) => warn!("{}: interface discovery failed: {}", host, e),
            }
        }

        let synchronizer = Synchronizer::new(graph.clone());
        synchronizer.start();

        let collector = Arc::new(Collector::new(
            graph.clone(),
            runner,
            host.clone(),
            config.ceph_binary.clone(),
        ));
        let initial = collector.collect_once().await;
        let collector = collector.spawn(config.tick_interval());

        Ok(Self {
            graph,
            host,
            synchronizer,
            collector,
            initial,
        })
    }

    /// Stop collecting, then stop synchronizing.
    pub async fn stop(self) {
        self.collector.stop().await;
        self.synchronizer.stop();
        info!("Agent for {} stopped", self.host);
    }

    #[must_use]
    pub fn graph(&self) -> &Arc<G> {
        &self.graph
    }

    /// Id of the host node.
    #[must_use]
    pub fn host(&self) -> &NodeId {
        &self.host
    }

    #[must_use]
    pub fn synchronizer(&self) -> &Arc<Synchronizer<G>> {
        &self.synchronizer
    }

    /// What the collection run at start-up attached.
    #[must_use]
    pub fn initial_collection(&self) -> &CollectionReport {
        &self.initial
    }
}
