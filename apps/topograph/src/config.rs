//! # Agent Configuration
//!
//! TOML file deserialized into [`AgentConfig`]. Every key has a default, so
//! an empty file is a valid configuration.
//!
//! ```toml
//! host_id = "storage-1"
//! host_update = 10
//! command_timeout = 30
//!
//! [metadata]
//! Rack = "r12"
//! ```

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use topograph_core::TopologyError;
use topograph_core::primitives::HOST_UPDATE_SCALE;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "TOPOGRAPH_CONFIG";

/// Read when neither `--config` nor [`CONFIG_ENV`] is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/topograph/agent.toml";

/// Maximum configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// `Name` of the host node.
    pub host_id: String,
    /// Collector period, in units of [`HOST_UPDATE_SCALE`] seconds.
    pub host_update: u64,
    /// Seconds before an external command is abandoned.
    pub command_timeout: u64,
    pub ceph_binary: String,
    pub lshw_binary: String,
    /// Register local network interfaces as device nodes.
    pub discover_interfaces: bool,
    /// Extra attributes merged into the host node.
    #[serde(deserialize_with = "metadata_table")]
    pub metadata: Map<String, Value>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host_id: default_host_id(),
            host_update: 10,
            command_timeout: 30,
            ceph_binary: "ceph".to_string(),
            lshw_binary: "lshw".to_string(),
            discover_interfaces: true,
            metadata: Map::new(),
        }
    }
}

fn default_host_id() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string())
}

fn metadata_table<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        _ => Err(serde::de::Error::custom("metadata has wrong format")),
    }
}

impl AgentConfig {
    /// Parse a configuration document.
    pub fn from_toml_str(raw: &str) -> Result<Self, TopologyError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| TopologyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration.
    ///
    /// An explicit path (argument, then [`CONFIG_ENV`]) must exist. Without
    /// one, [`DEFAULT_CONFIG_PATH`] is read if present, else defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self, TopologyError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.is_file() {
                    Self::from_file(default)
                } else {
                    tracing::debug!("No configuration file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Read and parse one file.
    pub fn from_file(path: &Path) -> Result<Self, TopologyError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            TopologyError::Config(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(TopologyError::Config(format!(
                "File size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            TopologyError::Config(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<(), TopologyError> {
        if self.host_id.trim().is_empty() {
            return Err(TopologyError::Config("host_id must not be empty".into()));
        }
        if self.host_update == 0 {
            return Err(TopologyError::Config("host_update must be positive".into()));
        }
        if self.command_timeout == 0 {
            return Err(TopologyError::Config(
                "command_timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Period of the collector.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.host_update.saturating_mul(HOST_UPDATE_SCALE))
    }

    /// Budget of one external command.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }
}
