//! # Host Bootstrap
//!
//! Builds the attributes of the host node: identity, configured metadata,
//! cloud instance id, OS facts and the reclassified hardware tree.

use crate::config::AgentConfig;
use crate::runner::CommandRunner;
use serde_json::{Value, json};
use std::path::Path;
use sysinfo::System;
use topograph_core::primitives::HOST_TYPE;
use topograph_core::{Metadata, TopologyError, reclassify_value};
use tracing::{debug, warn};

/// Written by cloud-init on cloud instances.
pub const INSTANCE_ID_PATH: &str = "/var/lib/cloud/data/instance-id";

pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// CPUs removed from the kernel scheduler (`isolcpus=`).
pub const ISOLATED_CPU_PATH: &str = "/sys/devices/system/cpu/isolated";

/// Operating system facts of this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsFacts {
    pub os: String,
    pub platform: String,
    pub platform_family: String,
    pub platform_version: String,
    pub kernel_version: String,
    pub isolated_cpus: Vec<u32>,
}

impl OsFacts {
    /// Read the facts of the running system.
    #[must_use]
    pub fn gather() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            platform: System::distribution_id(),
            platform_family: read_file(Path::new(OS_RELEASE_PATH))
                .map(|raw| platform_family(&raw))
                .unwrap_or_default(),
            platform_version: System::os_version().unwrap_or_default(),
            kernel_version: System::kernel_version().unwrap_or_default(),
            isolated_cpus: read_file(Path::new(ISOLATED_CPU_PATH))
                .and_then(|raw| {
                    let cpus = parse_cpu_list(&raw);
                    if cpus.is_none() {
                        warn!("Unreadable CPU list in {}: {:?}", ISOLATED_CPU_PATH, raw.trim());
                    }
                    cpus
                })
                .unwrap_or_default(),
        }
    }

    fn apply(&self, metadata: &mut Metadata) {
        for (key, value) in [
            ("OS", &self.os),
            ("Platform", &self.platform),
            ("PlatformFamily", &self.platform_family),
            ("PlatformVersion", &self.platform_version),
            ("KernelVersion", &self.kernel_version),
        ] {
            if !value.is_empty() {
                metadata.set_field(key, json!(value));
            }
        }
        if !self.isolated_cpus.is_empty() {
            metadata.set_field("IsolatedCPU", json!(self.isolated_cpus));
        }
    }
}

/// Distribution family from `os-release` contents: the first `ID_LIKE`
/// entry, else `ID`.
fn platform_family(os_release: &str) -> String {
    let field = |name: &str| {
        os_release.lines().find_map(|line| {
            let value = line.trim().strip_prefix(name)?.strip_prefix('=')?;
            let value = value.trim().trim_matches(['"', '\'']);
            value.split_whitespace().next().map(str::to_string)
        })
    };
    field("ID_LIKE").or_else(|| field("ID")).unwrap_or_default()
}

/// Kernel CPU list format: `0-2,5` is `[0, 1, 2, 5]`.
fn parse_cpu_list(raw: &str) -> Option<Vec<u32>> {
    let mut cpus = Vec::new();
    for part in raw.trim().split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((first, last)) => {
                let (first, last) = (first.parse::<u32>().ok()?, last.parse::<u32>().ok()?);
                if first > last {
                    return None;
                }
                cpus.extend(first..=last);
            }
            None => cpus.push(part.parse().ok()?),
        }
    }
    Some(cpus)
}

/// Full attribute set of the host node.
///
/// Configured metadata never overrides `Name` or `Type`.
pub async fn host_metadata<R: CommandRunner>(
    config: &AgentConfig,
    runner: &R,
    instance_id_path: &Path,
) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.extend(config.metadata.clone());
    metadata.set_field("Name", json!(config.host_id));
    metadata.set_field("Type", json!(HOST_TYPE));
    if let Some(hostname) = System::host_name() {
        metadata.set_field("Hostname", json!(hostname));
    }

    if let Some(instance_id) = read_instance_id(instance_id_path) {
        metadata.set_field("InstanceID", json!(instance_id));
    }

    OsFacts::gather().apply(&mut metadata);

    match hardware_tree(runner, &config.lshw_binary).await {
        Ok(tree) => metadata.set_field("Hardware", tree),
        Err(e) => {
            warn!("Hardware inventory unavailable, using CPU list: {}", e);
            metadata.set_field("CPU", cpu_list());
        }
    }

    metadata
}

fn read_file(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .map_err(|e| debug!("Cannot read {}: {}", path.display(), e))
        .ok()
}

fn read_instance_id(path: &Path) -> Option<String> {
    let raw = read_file(path)?;
    let id = raw.trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// `lshw -quiet -json`, re-keyed by class.
pub async fn hardware_tree<R: CommandRunner>(
    runner: &R,
    lshw_binary: &str,
) -> Result<Value, TopologyError> {
    let stdout = runner.run(lshw_binary, &["-quiet", "-json"]).await?;
    let mut tree: Value = serde_json::from_slice(&stdout)
        .map_err(|e| TopologyError::Collection(format!("{}: invalid JSON: {}", lshw_binary, e)))?;
    reclassify_value(&mut tree);
    Ok(tree)
}

/// One entry per logical CPU.
fn cpu_list() -> Value {
    let mut system = System::new();
    system.refresh_cpu();
    Value::Array(
        system
            .cpus()
            .iter()
            .enumerate()
            .map(|(index, cpu)| {
                json!({
                    "CPU": index,
                    "VendorID": cpu.vendor_id(),
                    "ModelName": cpu.brand(),
                    "Mhz": cpu.frequency(),
                })
            })
            .collect(),
    )
}
