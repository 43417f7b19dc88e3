//! # Graph Capability
//!
//! The attributed topology graph as consumed by the synchronizer.
//!
//! This module defines the `TopologyGraph` trait (node/edge CRUD, attribute
//! lookup, event subscription) and `Graph`, an in-memory implementation used
//! by the agent and the tests. All data structures use `BTreeMap` for
//! deterministic ordering.
//!
//! ## Event delivery
//!
//! Mutations queue `NodeEvent`s and deliver them once the graph lock is
//! released. A listener that mutates the graph from inside a callback does not
//! recurse: its events are appended to the queue and delivered by the
//! dispatcher already running, after the current callback returns.

use crate::primitives::OWNERSHIP_RELATION;
use crate::{Filter, Metadata, Node, NodeId, TopologyError};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

// =============================================================================
// LISTENERS
// =============================================================================

/// Receiver of node lifecycle events. Every callback defaults to a no-op.
pub trait GraphListener: Send + Sync {
    /// A node was created.
    fn on_node_added(&self, _node: &Node) {}

    /// A node's attributes were written.
    fn on_node_updated(&self, _node: &Node) {}

    /// A node was removed; `node` carries its last attributes.
    fn on_node_deleted(&self, _node: &Node) {}
}

/// Handle returned by [`TopologyGraph::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// A node lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    Added(Node),
    Updated(Node),
    Deleted(Node),
}

impl NodeEvent {
    fn deliver(&self, listener: &dyn GraphListener) {
        match self {
            Self::Added(node) => listener.on_node_added(node),
            Self::Updated(node) => listener.on_node_updated(node),
            Self::Deleted(node) => listener.on_node_deleted(node),
        }
    }
}

// =============================================================================
// TOPOLOGYGRAPH TRAIT
// =============================================================================

/// The TopologyGraph trait defines the graph operations the core relies on.
///
/// Implementations use interior locking so a single instance can be shared
/// behind an `Arc` between the collector and the synchronizer.
pub trait TopologyGraph: Send + Sync {
    /// Get a snapshot of a node.
    fn get_node(&self, id: &NodeId) -> Result<Option<Node>, TopologyError>;

    /// First node, in identifier order, whose attributes match `filter`.
    fn lookup_first_node(&self, filter: &Filter) -> Result<Option<Node>, TopologyError>;

    /// First child of `parent` (target of an ownership edge), in identifier
    /// order, whose attributes match `filter`.
    fn lookup_first_child(
        &self,
        parent: &NodeId,
        filter: &Filter,
    ) -> Result<Option<Node>, TopologyError>;

    /// Create the node, or overwrite the attributes of the existing node
    /// with the same identifier.
    fn upsert_node(&self, id: NodeId, metadata: Metadata) -> Result<Node, TopologyError>;

    /// Remove a node and every edge touching it.
    fn delete_node(&self, id: &NodeId) -> Result<(), TopologyError>;

    /// Write one attribute (dotted key) of an existing node.
    fn set_attribute(&self, id: &NodeId, key: &str, value: Value) -> Result<(), TopologyError>;

    /// Read one attribute (dotted key) of an existing node.
    fn get_attribute(&self, id: &NodeId, key: &str) -> Result<Option<Value>, TopologyError> {
        let node = self
            .get_node(id)?
            .ok_or_else(|| TopologyError::NodeNotFound(id.clone()))?;
        Ok(node.metadata.get_field(key).cloned())
    }

    /// Create or overwrite the edge `from -> to` identified by the
    /// `RelationType` attribute of `metadata`. Never duplicates an edge.
    fn link(&self, from: &NodeId, to: &NodeId, metadata: Metadata) -> Result<(), TopologyError>;

    /// Remove the edges leaving `from` whose metadata matches `filter`.
    /// Returns how many were removed.
    fn unlink(&self, from: &NodeId, filter: &Filter) -> Result<usize, TopologyError>;

    /// Create the ownership edge `parent -> child`.
    fn add_ownership_edge(&self, parent: &NodeId, child: &NodeId) -> Result<(), TopologyError> {
        self.link(
            parent,
            child,
            Metadata::from_pairs([("RelationType", Value::from(OWNERSHIP_RELATION))]),
        )
    }

    /// Register a listener for node events.
    fn subscribe(&self, listener: Arc<dyn GraphListener>) -> ListenerId;

    /// Remove a listener. Returns `false` if it was not registered.
    fn unsubscribe(&self, id: ListenerId) -> bool;
}

// =============================================================================
// EDGES
// =============================================================================

/// A directed, attributed edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub metadata: Metadata,
}

impl Edge {
    /// The `RelationType` attribute, empty when absent.
    #[must_use]
    pub fn relation(&self) -> &str {
        self.metadata.get_str("RelationType").unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct EdgeKey {
    from: NodeId,
    to: NodeId,
    relation: String,
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

#[derive(Debug, Default)]
struct GraphState {
    nodes: BTreeMap<NodeId, Metadata>,
    edges: BTreeMap<EdgeKey, Metadata>,
}

/// In-memory topology graph.
#[derive(Default)]
pub struct Graph {
    state: Mutex<GraphState>,
    listeners: Mutex<BTreeMap<ListenerId, Arc<dyn GraphListener>>>,
    pending: Mutex<VecDeque<NodeEvent>>,
    dispatching: Mutex<()>,
    next_listener: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        lock(&self.state).nodes.len()
    }

    /// Get the total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        lock(&self.state).edges.len()
    }

    /// Get all nodes in deterministic order.
    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        lock(&self.state)
            .nodes
            .iter()
            .map(|(id, metadata)| Node::new(id.clone(), metadata.clone()))
            .collect()
    }

    /// Get all edges in deterministic order.
    #[must_use]
    pub fn edges(&self) -> Vec<Edge> {
        lock(&self.state)
            .edges
            .iter()
            .map(|(key, metadata)| Edge {
                from: key.from.clone(),
                to: key.to.clone(),
                metadata: metadata.clone(),
            })
            .collect()
    }

    /// Check if an edge with the given relation exists.
    #[must_use]
    pub fn contains_edge(&self, from: &NodeId, to: &NodeId, relation: &str) -> bool {
        lock(&self.state).edges.contains_key(&EdgeKey {
            from: from.clone(),
            to: to.clone(),
            relation: relation.to_string(),
        })
    }

    /// Run a mutation under the state lock, then deliver the events it raised.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut GraphState, &mut Vec<NodeEvent>) -> Result<T, TopologyError>,
    ) -> Result<T, TopologyError> {
        let mut events = Vec::new();
        let result = {
            let mut state = lock(&self.state);
            f(&mut state, &mut events)
        };
        if !events.is_empty() {
            lock(&self.pending).extend(events);
            self.dispatch();
        }
        result
    }

    fn next_event(&self) -> Option<NodeEvent> {
        lock(&self.pending).pop_front()
    }

    fn dispatch(&self) {
        loop {
            let guard = match self.dispatching.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                // Another delivery is running (possibly further up this
                // thread's stack); it drains the queue.
                Err(TryLockError::WouldBlock) => return,
            };

            while let Some(event) = self.next_event() {
                let listeners: Vec<Arc<dyn GraphListener>> =
                    lock(&self.listeners).values().cloned().collect();
                for listener in &listeners {
                    event.deliver(listener.as_ref());
                }
            }
            drop(guard);

            // An event queued between the last pop and the unlock would
            // otherwise wait for the next mutation.
            if lock(&self.pending).is_empty() {
                return;
            }
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Graph")
            .field("nodes", &state.nodes.len())
            .field("edges", &state.edges.len())
            .finish_non_exhaustive()
    }
}

impl TopologyGraph for Graph {
    fn get_node(&self, id: &NodeId) -> Result<Option<Node>, TopologyError> {
        Ok(lock(&self.state)
            .nodes
            .get(id)
            .map(|metadata| Node::new(id.clone(), metadata.clone())))
    }

    fn lookup_first_node(&self, filter: &Filter) -> Result<Option<Node>, TopologyError> {
        Ok(lock(&self.state)
            .nodes
            .iter()
            .find(|(_, metadata)| filter.matches(metadata))
            .map(|(id, metadata)| Node::new(id.clone(), metadata.clone())))
    }

    fn lookup_first_child(
        &self,
        parent: &NodeId,
        filter: &Filter,
    ) -> Result<Option<Node>, TopologyError> {
        let state = lock(&self.state);
        if !state.nodes.contains_key(parent) {
            return Err(TopologyError::NodeNotFound(parent.clone()));
        }
        Ok(state
            .edges
            .keys()
            .filter(|key| &key.from == parent && key.relation == OWNERSHIP_RELATION)
            .filter_map(|key| state.nodes.get_key_value(&key.to))
            .find(|(_, metadata)| filter.matches(metadata))
            .map(|(id, metadata)| Node::new(id.clone(), metadata.clone())))
    }

    fn upsert_node(&self, id: NodeId, metadata: Metadata) -> Result<Node, TopologyError> {
        self.mutate(|state, events| {
            let node = Node::new(id.clone(), metadata.clone());
            match state.nodes.insert(id, metadata) {
                Some(_) => events.push(NodeEvent::Updated(node.clone())),
                None => events.push(NodeEvent::Added(node.clone())),
            }
            Ok(node)
        })
    }

    fn delete_node(&self, id: &NodeId) -> Result<(), TopologyError> {
        self.mutate(|state, events| {
            let metadata = state
                .nodes
                .remove(id)
                .ok_or_else(|| TopologyError::NodeNotFound(id.clone()))?;
            state
                .edges
                .retain(|key, _| &key.from != id && &key.to != id);
            events.push(NodeEvent::Deleted(Node::new(id.clone(), metadata)));
            Ok(())
        })
    }

    fn set_attribute(&self, id: &NodeId, key: &str, value: Value) -> Result<(), TopologyError> {
        self.mutate(|state, events| {
            let metadata = state
                .nodes
                .get_mut(id)
                .ok_or_else(|| TopologyError::NodeNotFound(id.clone()))?;
            metadata.set_field(key, value);
            events.push(NodeEvent::Updated(Node::new(id.clone(), metadata.clone())));
            Ok(())
        })
    }

    fn link(&self, from: &NodeId, to: &NodeId, metadata: Metadata) -> Result<(), TopologyError> {
        let mut state = lock(&self.state);
        for id in [from, to] {
            if !state.nodes.contains_key(id) {
                return Err(TopologyError::NodeNotFound(id.clone()));
            }
        }
        let key = EdgeKey {
            from: from.clone(),
            to: to.clone(),
            relation: metadata.get_str("RelationType").unwrap_or_default().to_string(),
        };
        state.edges.insert(key, metadata);
        Ok(())
    }

    fn unlink(&self, from: &NodeId, filter: &Filter) -> Result<usize, TopologyError> {
        let mut state = lock(&self.state);
        if !state.nodes.contains_key(from) {
            return Err(TopologyError::NodeNotFound(from.clone()));
        }
        let before = state.edges.len();
        state
            .edges
            .retain(|key, metadata| &key.from != from || !filter.matches(metadata));
        Ok(before - state.edges.len())
    }

    fn subscribe(&self, listener: Arc<dyn GraphListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).insert(id, listener);
        id
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        lock(&self.listeners).remove(&id).is_some()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl GraphListener for Recorder {
        fn on_node_added(&self, node: &Node) {
            lock(&self.events).push(format!("added:{}", node.id));
        }
        fn on_node_updated(&self, node: &Node) {
            lock(&self.events).push(format!("updated:{}", node.id));
        }
        fn on_node_deleted(&self, node: &Node) {
            lock(&self.events).push(format!("deleted:{}", node.id));
        }
    }

    fn host(name: &str) -> Metadata {
        Metadata::from_pairs([("Name", json!(name)), ("Type", json!("host"))])
    }

    #[test]
    fn upsert_same_id_overwrites() {
        let graph = Graph::new();
        graph.upsert_node(NodeId::new("a"), host("one")).expect("insert");
        graph.upsert_node(NodeId::new("a"), host("two")).expect("update");

        assert_eq!(graph.node_count(), 1);
        let node = graph.get_node(&NodeId::new("a")).expect("get");
        assert_eq!(node.and_then(|n| n.get_str("Name").map(String::from)), Some("two".into()));
    }

    #[test]
    fn link_twice_does_not_duplicate() {
        let graph = Graph::new();
        let a = graph.upsert_node(NodeId::new("a"), host("a")).expect("insert").id;
        let b = graph.upsert_node(NodeId::new("b"), host("b")).expect("insert").id;

        graph.add_ownership_edge(&a, &b).expect("link");
        graph.add_ownership_edge(&a, &b).expect("link");
        assert_eq!(graph.edge_count(), 1);

        // A different relation between the same nodes is a distinct edge.
        graph
            .link(&a, &b, Metadata::from_pairs([("RelationType", json!("frontIface"))]))
            .expect("link");
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn unlink_removes_only_matching_outgoing_edges() {
        let graph = Graph::new();
        let a = graph.upsert_node(NodeId::new("a"), host("a")).expect("insert").id;
        let b = graph.upsert_node(NodeId::new("b"), host("b")).expect("insert").id;
        let socket = |role: &str| {
            Metadata::from_pairs([("Type", json!("socket")), ("RelationType", json!(role))])
        };

        graph.add_ownership_edge(&a, &b).expect("link");
        graph.link(&a, &b, socket("frontIface")).expect("link");
        graph.link(&a, &b, socket("backIface")).expect("link");
        graph.link(&b, &a, socket("frontIface")).expect("link");

        let removed = graph
            .unlink(&a, &Filter::term("Type", "socket"))
            .expect("unlink");
        assert_eq!(removed, 2);
        assert!(graph.contains_edge(&a, &b, "ownership"));
        assert!(!graph.contains_edge(&a, &b, "frontIface"));
        assert!(graph.contains_edge(&b, &a, "frontIface"));

        let missing = graph.unlink(&NodeId::new("ghost"), &Filter::term("Type", "socket"));
        assert!(matches!(missing, Err(TopologyError::NodeNotFound(_))));
    }

    #[test]
    fn link_to_missing_node_fails() {
        let graph = Graph::new();
        let a = graph.upsert_node(NodeId::new("a"), host("a")).expect("insert").id;
        let result = graph.add_ownership_edge(&a, &NodeId::new("ghost"));
        assert!(matches!(result, Err(TopologyError::NodeNotFound(_))));
    }

    #[test]
    fn lookup_first_child_only_follows_ownership() {
        let graph = Graph::new();
        let h = graph.upsert_node(NodeId::new("h"), host("h")).expect("insert").id;
        let eth = graph
            .upsert_node(NodeId::new("eth0"), Metadata::from_pairs([("Name", json!("eth0"))]))
            .expect("insert")
            .id;
        let filter = Filter::term("Name", "eth0");

        graph
            .link(&h, &eth, Metadata::from_pairs([("RelationType", json!("layer2"))]))
            .expect("link");
        assert!(graph.lookup_first_child(&h, &filter).expect("lookup").is_none());

        graph.add_ownership_edge(&h, &eth).expect("link");
        let child = graph.lookup_first_child(&h, &filter).expect("lookup");
        assert_eq!(child.map(|n| n.id), Some(eth));
    }

    #[test]
    fn delete_removes_touching_edges() {
        let graph = Graph::new();
        let a = graph.upsert_node(NodeId::new("a"), host("a")).expect("insert").id;
        let b = graph.upsert_node(NodeId::new("b"), host("b")).expect("insert").id;
        graph.add_ownership_edge(&a, &b).expect("link");

        graph.delete_node(&b).expect("delete");
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.delete_node(&b).is_err());
    }

    #[test]
    fn attributes_use_dotted_keys() {
        let graph = Graph::new();
        let a = graph.upsert_node(NodeId::new("a"), host("a")).expect("insert").id;
        graph
            .set_attribute(&a, "Software.Ceph.OSD.metadata", json!("blob"))
            .expect("set");

        let value = graph.get_attribute(&a, "Software.Ceph.OSD.metadata").expect("get");
        assert_eq!(value, Some(json!("blob")));
        assert!(graph.get_attribute(&NodeId::new("ghost"), "Name").is_err());
    }

    #[test]
    fn listeners_receive_events_in_order() {
        let graph = Graph::new();
        let recorder = Arc::new(Recorder::default());
        let id = graph.subscribe(recorder.clone());

        let a = graph.upsert_node(NodeId::new("a"), host("a")).expect("insert").id;
        graph.set_attribute(&a, "Hostname", json!("a.local")).expect("set");
        graph.delete_node(&a).expect("delete");

        assert!(graph.unsubscribe(id));
        graph.upsert_node(NodeId::new("b"), host("b")).expect("insert");

        let events = lock(&recorder.events).clone();
        assert_eq!(events, vec!["added:a", "updated:a", "deleted:a"]);
        assert!(!graph.unsubscribe(id));
    }

    /// Listener that creates a child node whenever a host is added.
    struct Spawner {
        graph: Arc<Graph>,
        seen: Mutex<Vec<String>>,
    }

    impl GraphListener for Spawner {
        fn on_node_added(&self, node: &Node) {
            lock(&self.seen).push(node.id.to_string());
            if node.get_str("Type") == Some("host") {
                let child = NodeId::new(format!("{}_child", node.id));
                let created = self
                    .graph
                    .upsert_node(child.clone(), Metadata::from_pairs([("Type", json!("child"))]));
                assert!(created.is_ok());
                // The child's Added event is queued, not delivered yet.
                assert_eq!(lock(&self.seen).len(), 1);
            }
        }
    }

    #[test]
    fn mutation_from_listener_is_queued_not_reentrant() {
        let graph = Arc::new(Graph::new());
        let spawner = Arc::new(Spawner {
            graph: graph.clone(),
            seen: Mutex::new(Vec::new()),
        });
        let id = graph.subscribe(spawner.clone());

        graph.upsert_node(NodeId::new("h"), host("h")).expect("insert");

        assert_eq!(*lock(&spawner.seen), vec!["h", "h_child"]);
        assert_eq!(graph.node_count(), 2);
        graph.unsubscribe(id);
    }
}
