//! # topograph-core
//!
//! Incremental rendering of an external storage cluster into a live topology
//! graph - THE LOGIC.
//!
//! This crate decides *when* a Ceph snapshot attached to a host node must be
//! rendered, renders it into daemon nodes and edges, and guarantees at most
//! one fully applied rendering per observed snapshot version. It also
//! re-keys raw hardware descriptions into class-indexed trees.
//!
//! ## Layout
//!
//! - `types` → identifiers, metadata and the error enum
//! - `formats` → the versioned snapshot blob codec
//! - `ceph` → snapshot models and how each record renders
//! - `graph` → the consumed graph capability and an in-memory store
//! - `ledger` → the rendered-version ledger
//! - `sync` → the event-driven synchronizer
//! - `hardware` → the hardware tree reclassifier
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies: callers own I/O and scheduling
//! - Deterministic: `BTreeMap` ordering and byte-stable encoding
//! - The graph store is an external collaborator reached only through
//!   [`TopologyGraph`]

// =============================================================================
// MODULES
// =============================================================================

pub mod ceph;
pub mod filter;
pub mod formats;
pub mod graph;
pub mod hardware;
pub mod ledger;
pub mod primitives;
pub mod sync;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Metadata, Node, NodeId, TopologyError};

// =============================================================================
// RE-EXPORTS: Graph Capability
// =============================================================================

pub use filter::{Filter, Ipv4Cidr};
pub use graph::{Edge, Graph, GraphListener, ListenerId, NodeEvent, TopologyGraph};

// =============================================================================
// RE-EXPORTS: Snapshots (from ceph and formats modules)
// =============================================================================

pub use ceph::{ClusterSummary, MonRecord, OsdRecord, Renderable, Snapshot, SnapshotKind};
pub use formats::{SnapshotHeader, decode_snapshot, decode_snapshot_kind, encode_snapshot};

// =============================================================================
// RE-EXPORTS: Synchronization
// =============================================================================

pub use hardware::{reclassify, reclassify_value};
pub use ledger::{LedgerKey, RenderLedger, SyncState};
pub use sync::{PassOutcome, PassStatus, RecordFailure, SyncReport, Synchronizer};
