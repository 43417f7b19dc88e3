//! # Ceph Records
//!
//! Typed snapshots of a Ceph cluster, decoded once at the boundary:
//! - `ClusterSummary` from `ceph -s -f json`
//! - `OsdRecord` list from `ceph osd metadata -f json`
//! - `MonRecord` list from `ceph mon metadata -f json`
//!
//! Every record kind implements [`Renderable`], which is all the
//! synchronizer needs to place it in the graph.

mod cluster;
mod mon;
mod osd;

pub use cluster::*;
pub use mon::*;
pub use osd::*;

use crate::primitives::{
    CEPH_MANAGER, CLUSTER_METADATA_KEY, MON_METADATA_KEY, OSD_METADATA_KEY,
};
use crate::{Metadata, NodeId, TopologyError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::net::Ipv4Addr;

// =============================================================================
// SNAPSHOT KINDS
// =============================================================================

/// The three object kinds carried by a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SnapshotKind {
    Cluster,
    Osd,
    Mon,
}

impl SnapshotKind {
    /// All kinds, in rendering order.
    pub const ALL: [SnapshotKind; 3] = [Self::Cluster, Self::Osd, Self::Mon];

    /// Host-node attribute holding the encoded snapshot of this kind.
    #[must_use]
    pub const fn attribute_key(self) -> &'static str {
        match self {
            Self::Cluster => CLUSTER_METADATA_KEY,
            Self::Osd => OSD_METADATA_KEY,
            Self::Mon => MON_METADATA_KEY,
        }
    }

    /// Rendered once per reporting host instead of once per cluster.
    ///
    /// Every host reports the same summary, but each gets its own node.
    #[must_use]
    pub const fn per_reporter(self) -> bool {
        matches!(self, Self::Cluster)
    }

    /// `Type` tag of the rendered nodes, also the key under `Ceph`.
    #[must_use]
    pub const fn type_tag(self) -> &'static str {
        match self {
            Self::Cluster => "CLUSTER",
            Self::Osd => "OSD",
            Self::Mon => "MON",
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// One point-in-time capture of one object kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Snapshot {
    Cluster(ClusterSummary),
    Osds(Vec<OsdRecord>),
    Mons(Vec<MonRecord>),
}

impl Snapshot {
    /// The kind of this snapshot.
    #[must_use]
    pub fn kind(&self) -> SnapshotKind {
        match self {
            Self::Cluster(_) => SnapshotKind::Cluster,
            Self::Osds(_) => SnapshotKind::Osd,
            Self::Mons(_) => SnapshotKind::Mon,
        }
    }

    /// Parse the JSON output of the command that produces `kind`.
    pub fn from_json(kind: SnapshotKind, raw: &[u8]) -> Result<Self, TopologyError> {
        let parse_err = |e: serde_json::Error| {
            TopologyError::Collection(format!("unparsable {} output: {}", kind, e))
        };
        Ok(match kind {
            SnapshotKind::Cluster => Self::Cluster(serde_json::from_slice(raw).map_err(parse_err)?),
            SnapshotKind::Osd => Self::Osds(serde_json::from_slice(raw).map_err(parse_err)?),
            SnapshotKind::Mon => Self::Mons(serde_json::from_slice(raw).map_err(parse_err)?),
        })
    }
}

// =============================================================================
// INTERFACE REFERENCES
// =============================================================================

/// How a declared interface is found under its host node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceLookup {
    /// Exact `Name` match.
    Name(String),
    /// A non-loopback device whose IPv4 network contains the address.
    Address(Ipv4Addr),
}

/// An interface a record declares it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRef {
    pub lookup: InterfaceLookup,
    /// `RelationType` of the edge, i.e. the role of the interface.
    pub role: &'static str,
    /// Address observed by the cluster, copied onto the edge.
    pub address: String,
}

impl fmt::Display for InterfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lookup {
            InterfaceLookup::Name(name) => write!(f, "{} {}", self.role, name),
            InterfaceLookup::Address(addr) => write!(f, "{} for {}", self.role, addr),
        }
    }
}

// =============================================================================
// RENDERABLE
// =============================================================================

/// A record the synchronizer can turn into one graph node.
pub trait Renderable: Serialize {
    /// Snapshot kind the record belongs to.
    const KIND: SnapshotKind;

    /// Name of the host node the record belongs to. `reporter` is the
    /// `Name` of the host node carrying the snapshot. An empty result means
    /// the record cannot be placed and is skipped.
    fn hostname<'a>(&'a self, reporter: &'a str) -> &'a str;

    /// Identity of the component within its host.
    fn component_id(&self) -> String;

    /// Human-readable `Name` of the rendered node.
    fn display_name(&self) -> String;

    /// Interfaces the record is bound to.
    fn interfaces(&self) -> Result<Vec<InterfaceRef>, TopologyError>;

    /// Node identifier: `host_component`.
    fn node_key(&self, host: &str) -> NodeId {
        NodeId::new(format!("{}_{}", host, self.component_id()))
    }

    /// Attributes of the rendered node.
    fn metadata(&self) -> Result<Metadata, TopologyError> {
        let record = serde_json::to_value(self)
            .map_err(|e| TopologyError::Encode(format!("{} record: {}", Self::KIND, e)))?;
        let mut ceph = serde_json::Map::new();
        ceph.insert(Self::KIND.type_tag().to_string(), record);

        Ok(Metadata::from_pairs([
            ("Manager", Value::from(CEPH_MANAGER)),
            ("Type", Value::from(Self::KIND.type_tag())),
            ("Name", Value::from(self.display_name())),
            ("Ceph", Value::Object(ceph)),
        ]))
    }
}
