//! # Primitives
//!
//! Fixed constants of the topology core: attribute keys, tag values and the
//! snapshot format header.

/// Magic bytes of the snapshot blob header.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"TGSN";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the record layout.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Length of the snapshot header (magic + version).
pub const SNAPSHOT_HEADER_LEN: usize = 5;

/// Maximum accepted size of an encoded snapshot blob, validated before
/// base64 decoding.
pub const MAX_SNAPSHOT_BLOB_SIZE: usize = 16 * 1024 * 1024;

/// Attribute key of the encoded cluster summary on a host node.
pub const CLUSTER_METADATA_KEY: &str = "Software.Ceph.CLUSTER.metadata";

/// Attribute key of the encoded OSD list on a host node.
pub const OSD_METADATA_KEY: &str = "Software.Ceph.OSD.metadata";

/// Attribute key of the encoded monitor list on a host node.
pub const MON_METADATA_KEY: &str = "Software.Ceph.MON.metadata";

/// `Manager` tag of every node rendered from a Ceph snapshot.
pub const CEPH_MANAGER: &str = "ceph";

/// `Type` of host nodes.
pub const HOST_TYPE: &str = "host";

/// `Type` of physical network interface nodes.
pub const DEVICE_TYPE: &str = "device";

/// `Type` of edges linking a daemon to the interface it is bound to.
pub const SOCKET_EDGE_TYPE: &str = "socket";

/// `RelationType` of ownership edges.
pub const OWNERSHIP_RELATION: &str = "ownership";

/// `EncapType` value of loopback interfaces, never chosen for a daemon.
pub const LOOPBACK_ENCAP: &str = "loopback";

/// Multiplier applied to the configured `host_update` seconds to obtain the
/// collector tick period.
pub const HOST_UPDATE_SCALE: u64 = 15;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_len_matches_magic_plus_version() {
        assert_eq!(SNAPSHOT_HEADER_LEN, SNAPSHOT_MAGIC.len() + 1);
    }

    #[test]
    fn attribute_keys_share_namespace() {
        for key in [CLUSTER_METADATA_KEY, OSD_METADATA_KEY, MON_METADATA_KEY] {
            assert!(key.starts_with("Software.Ceph."));
            assert!(key.ends_with(".metadata"));
        }
    }
}
