//! # Core Type Definitions
//!
//! This module contains the shared types of the topology core:
//! - Graph identifiers and node snapshots (`NodeId`, `Node`)
//! - Attribute maps with dotted-path access (`Metadata`)
//! - Error types (`TopologyError`)
//!
//! ## Determinism Guarantees
//!
//! Attribute maps are backed by `serde_json::Map`, which is a `BTreeMap`
//! in this workspace: iteration and serialization follow key order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Identifier of a node in the topology graph.
///
/// Identifiers are chosen by the producer of the node (for daemon nodes the
/// synchronizer derives them from the record), so re-creating a node under
/// the same identifier updates it in place.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// METADATA
// =============================================================================

/// Attributes of a node or an edge.
///
/// Keys passed to [`Metadata::get_field`] and [`Metadata::set_field`] are
/// dotted paths: `Software.Ceph.OSD.metadata` addresses the `metadata` entry
/// of the `OSD` map nested under `Ceph` under `Software`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Create an empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an attribute map from top-level `(key, value)` pairs.
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up a value by dotted path.
    #[must_use]
    pub fn get_field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Look up a string value by dotted path.
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_field(path).and_then(Value::as_str)
    }

    /// Set a value at a dotted path, creating intermediate maps.
    ///
    /// An intermediate segment holding a non-map value is replaced by a map.
    pub fn set_field(&mut self, path: &str, value: Value) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(last) = segments.pop() else {
            return;
        };

        let mut current = &mut self.0;
        for segment in segments {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = match entry {
                Value::Object(map) => map,
                _ => return,
            };
        }
        current.insert(last.to_string(), value);
    }

    /// Merge top-level entries of `other` into this map, overwriting.
    pub fn extend(&mut self, other: Map<String, Value>) {
        self.0.extend(other);
    }

    /// Iterate over top-level entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Consume the map, returning the underlying JSON object.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// =============================================================================
// NODE
// =============================================================================

/// A point-in-time copy of a graph node.
///
/// Graph implementations hand out owned snapshots; mutating a `Node` does
/// not change the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// The node identifier.
    pub id: NodeId,
    /// The node attributes.
    pub metadata: Metadata,
}

impl Node {
    /// Create a new node snapshot.
    #[must_use]
    pub fn new(id: NodeId, metadata: Metadata) -> Self {
        Self { id, metadata }
    }

    /// Convenience accessor for a string attribute.
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.metadata.get_str(path)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while collecting, decoding or rendering topology.
///
/// None of them is fatal to a running agent: collection and decode errors
/// skip a cycle, resolution errors fail a single record and leave the
/// rendered-version ledger untouched so the next event retries the pass.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// An external command failed or returned unparsable output.
    #[error("Collection error: {0}")]
    Collection(String),

    /// A stored snapshot blob could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A snapshot or record could not be serialized.
    #[error("Encode error: {0}")]
    Encode(String),

    /// No host node matches the record's host field.
    #[error("Cannot find any node for host {0}")]
    HostNotFound(String),

    /// A declared interface does not resolve under the host node.
    #[error("{host}: missing interface {reference}")]
    InterfaceNotFound {
        /// Host name of the record.
        host: String,
        /// Interface name or address that failed to resolve.
        reference: String,
    },

    /// An IPv4 address could not be extracted from a daemon address.
    #[error("Cannot extract IP address from {0:?}")]
    AddressParse(String),

    /// A render pass finished with failed records.
    #[error("Rendering of {kind} for cluster {identity} incomplete: {failed} record(s) failed")]
    PartialRender {
        /// Cluster identity (fsid).
        identity: String,
        /// Snapshot kind of the pass.
        kind: String,
        /// Number of failed records.
        failed: usize,
    },

    /// The requested node was not found in the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Invalid agent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================
