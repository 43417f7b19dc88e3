//! Object storage daemon metadata, one element of `ceph osd metadata -f json`.

use super::{InterfaceLookup, InterfaceRef, Renderable, SnapshotKind};
use crate::TopologyError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsdRecord {
    pub id: i64,
    pub arch: String,
    pub back_addr: String,
    pub back_iface: String,
    pub bluefs: String,
    pub bluefs_db_access_mode: String,
    pub bluefs_db_block_size: String,
    pub bluefs_db_dev: String,
    pub bluefs_db_dev_node: String,
    pub bluefs_db_driver: String,
    pub bluefs_db_model: String,
    pub bluefs_db_partition_path: String,
    pub bluefs_db_rotational: String,
    pub bluefs_db_size: String,
    pub bluefs_db_type: String,
    pub bluefs_single_shared_device: String,
    pub bluestore_bdev_access_mode: String,
    pub bluestore_bdev_block_size: String,
    pub bluestore_bdev_dev: String,
    pub bluestore_bdev_dev_node: String,
    pub bluestore_bdev_driver: String,
    pub bluestore_bdev_model: String,
    pub bluestore_bdev_partition_path: String,
    pub bluestore_bdev_rotational: String,
    pub bluestore_bdev_size: String,
    pub bluestore_bdev_type: String,
    pub ceph_version: String,
    pub cpu: String,
    pub default_device_class: String,
    pub distro: String,
    pub distro_description: String,
    pub distro_version: String,
    pub front_addr: String,
    pub front_iface: String,
    pub hb_back_addr: String,
    pub hb_front_addr: String,
    pub hostname: String,
    pub journal_rotational: String,
    pub kernel_description: String,
    pub kernel_version: String,
    pub mem_swap_kb: String,
    pub mem_total_kb: String,
    pub os: String,
    pub osd_data: String,
    pub osd_objectstore: String,
    pub rotational: String,
}

impl Renderable for OsdRecord {
    const KIND: SnapshotKind = SnapshotKind::Osd;

    fn hostname<'a>(&'a self, _reporter: &'a str) -> &'a str {
        &self.hostname
    }

    fn component_id(&self) -> String {
        self.id.to_string()
    }

    fn display_name(&self) -> String {
        format!("osd.{}", self.id)
    }

    /// Front (public) and back (cluster) networks, when declared.
    fn interfaces(&self) -> Result<Vec<InterfaceRef>, TopologyError> {
        let declared = [
            ("frontIface", &self.front_iface, &self.front_addr),
            ("backIface", &self.back_iface, &self.back_addr),
        ];
        Ok(declared
            .into_iter()
            .filter(|(_, iface, _)| !iface.is_empty())
            .map(|(role, iface, addr)| InterfaceRef {
                lookup: InterfaceLookup::Name(iface.clone()),
                role,
                address: addr.clone(),
            })
            .collect())
    }
}
