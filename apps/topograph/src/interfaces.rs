//! # Interface Discovery
//!
//! Registers the local network interfaces as device nodes owned by the
//! host node, so that daemons can be linked to the interfaces they bind.

use if_addrs::IfAddr;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use topograph_core::primitives::{DEVICE_TYPE, LOOPBACK_ENCAP};
use topograph_core::{Ipv4Cidr, Metadata, NodeId, TopologyError, TopologyGraph};

/// Encapsulation of every interface that is not a loopback.
pub const ETHER_ENCAP: &str = "ether";

/// One local interface with all its IPv4 networks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    pub name: String,
    pub ipv4: Vec<Ipv4Cidr>,
    pub loopback: bool,
}

impl LocalInterface {
    /// Node id of the interface: `hostid_ifname`.
    #[must_use]
    pub fn node_id(&self, host_id: &str) -> NodeId {
        NodeId::new(format!("{}_{}", host_id, self.name))
    }

    #[must_use]
    pub fn metadata(&self) -> Metadata {
        let encap = if self.loopback {
            LOOPBACK_ENCAP
        } else {
            ETHER_ENCAP
        };
        let ipv4: Vec<Value> = self.ipv4.iter().map(|c| json!(c.to_string())).collect();
        Metadata::from_pairs([
            ("Type", json!(DEVICE_TYPE)),
            ("Name", json!(self.name)),
            ("IPV4", Value::Array(ipv4)),
            ("EncapType", json!(encap)),
        ])
    }
}

/// Enumerate the interfaces of this machine, sorted by name.
pub fn discover() -> Result<Vec<LocalInterface>, TopologyError> {
    let addrs = if_addrs::get_if_addrs()
        .map_err(|e| TopologyError::Io(format!("Failed to enumerate interfaces: {}", e)))?;

    let mut by_name: BTreeMap<String, LocalInterface> = BTreeMap::new();
    for addr in addrs {
        let loopback = addr.is_loopback();
        let entry = by_name
            .entry(addr.name.clone())
            .or_insert_with(|| LocalInterface {
                name: addr.name.clone(),
                ipv4: Vec::new(),
                loopback,
            });
        entry.loopback |= loopback;
        if let IfAddr::V4(v4) = &addr.addr {
            let prefix = u32::from(v4.netmask).leading_ones() as u8;
            if let Some(cidr) = Ipv4Cidr::new(v4.ip, prefix) {
                entry.ipv4.push(cidr);
            }
        }
    }
    Ok(by_name.into_values().collect())
}

/// Upsert every interface under `host`. Returns the interface node ids.
pub fn register<G: TopologyGraph>(
    graph: &G,
    host: &NodeId,
    host_id: &str,
    interfaces: &[LocalInterface],
) -> Result<Vec<NodeId>, TopologyError> {
    interfaces
        .iter()
        .map(|iface| {
            let node = graph.upsert_node(iface.node_id(host_id), iface.metadata())?;
            graph.add_ownership_edge(host, &node.id)?;
            tracing::debug!("{}: registered interface {}", host_id, iface.name);
            Ok(node.id)
        })
        .collect()
}
