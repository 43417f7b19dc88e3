//! Monitor metadata, one element of `ceph mon metadata -f json`.

use super::{InterfaceLookup, InterfaceRef, Renderable, SnapshotKind};
use crate::TopologyError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::LazyLock;

/// `ip:port/nonce`; the first match wins, which also covers the
/// `[v2:ip:port/nonce,v1:ip:port/nonce]` vector form.
static MON_ADDR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d{1,3}(?:\.\d{1,3}){3}):\d+/\d+").ok());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonRecord {
    pub name: String,
    pub addr: String,
    pub arch: String,
    pub ceph_version: String,
    pub cpu: String,
    pub distro: String,
    pub distro_description: String,
    pub distro_version: String,
    pub hostname: String,
    pub kernel_description: String,
    pub kernel_version: String,
    pub mem_swap_kb: String,
    pub mem_total_kb: String,
    pub os: String,
}

impl MonRecord {
    /// The IPv4 address the monitor listens on.
    ///
    /// `Ok(None)` when no address is declared.
    pub fn ip(&self) -> Result<Option<Ipv4Addr>, TopologyError> {
        if self.addr.is_empty() {
            return Ok(None);
        }
        MON_ADDR
            .as_ref()
            .and_then(|re| re.captures(&self.addr))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<Ipv4Addr>().ok())
            .map(Some)
            .ok_or_else(|| TopologyError::AddressParse(self.addr.clone()))
    }
}

impl Renderable for MonRecord {
    const KIND: SnapshotKind = SnapshotKind::Mon;

    fn hostname<'a>(&'a self, _reporter: &'a str) -> &'a str {
        &self.hostname
    }

    fn component_id(&self) -> String {
        self.name.clone()
    }

    fn display_name(&self) -> String {
        format!("mon.{}", self.name)
    }

    /// The public interface, matched by address since monitors do not
    /// report interface names.
    fn interfaces(&self) -> Result<Vec<InterfaceRef>, TopologyError> {
        Ok(self
            .ip()?
            .map(|ip| InterfaceRef {
                lookup: InterfaceLookup::Address(ip),
                role: "publicIface",
                address: self.addr.clone(),
            })
            .into_iter()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mon(addr: &str) -> MonRecord {
        MonRecord {
            name: "a".into(),
            hostname: "storage-1".into(),
            addr: addr.into(),
            ..MonRecord::default()
        }
    }

    #[test]
    fn extracts_legacy_address() {
        assert_eq!(
            mon("10.41.61.43:6789/0").ip().expect("ip"),
            Some(Ipv4Addr::new(10, 41, 61, 43))
        );
    }

    #[test]
    fn extracts_first_of_address_vector() {
        let record = mon("[v2:10.0.0.5:3300/0,v1:10.0.0.5:6789/0]");
        assert_eq!(record.ip().expect("ip"), Some(Ipv4Addr::new(10, 0, 0, 5)));
    }

    #[test]
    fn empty_address_declares_no_interface() {
        let record = mon("");
        assert_eq!(record.ip().expect("ip"), None);
        assert!(record.interfaces().expect("interfaces").is_empty());
    }

    #[test]
    fn malformed_address_is_an_error() {
        assert!(matches!(mon("garbage").ip(), Err(TopologyError::AddressParse(_))));
        assert!(mon("999.0.0.1:6789/0").ip().is_err());
    }

    #[test]
    fn key_and_name() {
        let record = mon("10.0.0.5:6789/0");
        assert_eq!(record.node_key("storage-1").as_str(), "storage-1_a");
        assert_eq!(record.display_name(), "mon.a");

        let refs = record.interfaces().expect("interfaces");
        assert_eq!(refs[0].role, "publicIface");
        assert_eq!(refs[0].lookup, InterfaceLookup::Address(Ipv4Addr::new(10, 0, 0, 5)));
    }
}
