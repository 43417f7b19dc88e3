//! Cluster summary, as reported by `ceph -s -f json`.

use super::{InterfaceRef, Renderable, SnapshotKind};
use crate::TopologyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level cluster status. `fsid` is the cluster identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSummary {
    pub fsid: String,
    pub health: Health,
    pub election_epoch: i64,
    pub quorum: Vec<i64>,
    pub quorum_names: Vec<String>,
    pub monmap: MonMap,
    pub osdmap: OsdMapWrapper,
    pub pgmap: PgMap,
    pub fsmap: FsMap,
    pub mgrmap: MgrMap,
    pub servicemap: ServiceMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Health {
    /// Active health checks keyed by code (`OSD_DOWN`, `OSD_HOST_DOWN`, ...).
    pub checks: BTreeMap<String, HealthCheck>,
    pub status: String,
    pub summary: Vec<HealthSummary>,
    pub overall_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheck {
    pub severity: String,
    pub summary: HealthCheckMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckMessage {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSummary {
    pub severity: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonMap {
    pub epoch: i64,
    pub fsid: String,
    pub modified: String,
    pub created: String,
    pub features: MonFeatures,
    pub mons: Vec<MonMapEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonFeatures {
    pub persistent: Vec<String>,
    pub optional: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonMapEntry {
    pub rank: i64,
    pub name: String,
    pub addr: String,
    pub public_addr: String,
}

/// `ceph -s` nests the OSD map counters one level deeper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsdMapWrapper {
    pub osdmap: OsdMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsdMap {
    pub epoch: i64,
    pub num_osds: i64,
    pub num_up_osds: i64,
    pub num_in_osds: i64,
    pub full: bool,
    pub nearfull: bool,
    pub num_remapped_pgs: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgMap {
    pub pgs_by_state: Vec<PgStateCount>,
    pub num_pgs: i64,
    pub num_pools: i64,
    pub num_objects: i64,
    pub data_bytes: i64,
    pub bytes_used: i64,
    pub bytes_avail: i64,
    pub bytes_total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgStateCount {
    pub state_name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsMap {
    pub epoch: i64,
    pub by_rank: Vec<FsRank>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsRank {
    pub filesystem_id: i64,
    pub rank: i64,
    pub name: String,
    pub status: String,
    pub gid: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MgrMap {
    pub epoch: i64,
    pub active_gid: i64,
    pub active_name: String,
    pub active_addr: String,
    pub available: bool,
    pub standbys: Vec<MgrStandby>,
    pub modules: Vec<String>,
    pub available_modules: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MgrStandby {
    pub gid: i64,
    pub name: String,
    pub available: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceMap {
    pub epoch: i64,
    pub modified: String,
}

/// The summary renders as one node per reporting host.
impl Renderable for ClusterSummary {
    const KIND: SnapshotKind = SnapshotKind::Cluster;

    fn hostname<'a>(&'a self, reporter: &'a str) -> &'a str {
        reporter
    }

    fn component_id(&self) -> String {
        self.fsid.clone()
    }

    fn display_name(&self) -> String {
        format!("cluster.{}", self.fsid)
    }

    fn interfaces(&self) -> Result<Vec<InterfaceRef>, TopologyError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = r#"{
        "fsid": "5f2e0e3c-8e59-4c5a-8d3b-1f0d8a8f9c11",
        "health": {
            "checks": {
                "OSD_DOWN": {"severity": "HEALTH_WARN", "summary": {"message": "1 osds down"}}
            },
            "status": "HEALTH_WARN",
            "overall_status": "HEALTH_WARN"
        },
        "election_epoch": 12,
        "quorum": [0, 1, 2],
        "quorum_names": ["a", "b", "c"],
        "monmap": {"epoch": 3, "mons": [{"rank": 0, "name": "a", "addr": "10.0.0.5:6789/0"}]},
        "osdmap": {"osdmap": {"epoch": 40, "num_osds": 3, "num_up_osds": 2, "num_in_osds": 3}},
        "pgmap": {"pgs_by_state": [{"state_name": "active+clean", "count": 64}], "num_pgs": 64},
        "mgrmap": {"active_name": "a", "available": true, "standbys": [{"gid": 4, "name": "b"}]},
        "unknown_section": {"ignored": true}
    }"#;

    #[test]
    fn parses_status_output() {
        let summary: ClusterSummary = serde_json::from_str(STATUS).expect("parse");

        assert_eq!(summary.fsid, "5f2e0e3c-8e59-4c5a-8d3b-1f0d8a8f9c11");
        assert_eq!(summary.health.status, "HEALTH_WARN");
        assert_eq!(
            summary.health.checks.get("OSD_DOWN").map(|c| c.summary.message.as_str()),
            Some("1 osds down")
        );
        assert_eq!(summary.osdmap.osdmap.num_up_osds, 2);
        assert_eq!(summary.pgmap.pgs_by_state.len(), 1);
        assert_eq!(summary.monmap.mons[0].addr, "10.0.0.5:6789/0");
        assert!(summary.mgrmap.available);
    }

    #[test]
    fn renders_under_reporting_host() {
        let summary = ClusterSummary {
            fsid: "abc".into(),
            ..ClusterSummary::default()
        };

        assert_eq!(summary.hostname("node-1"), "node-1");
        assert_eq!(summary.node_key("node-1").as_str(), "node-1_abc");
        assert_eq!(summary.display_name(), "cluster.abc");
        assert!(summary.interfaces().expect("interfaces").is_empty());
    }
}
