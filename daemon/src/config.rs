//! Daemon configuration with TOML file support.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use mapkeeper_store::DEFAULT_RETRY_BUDGET;
use mapkeeper_store_lmdb::EnvironmentConfig;
use mapkeeper_utils::LogFormat;
use serde::{Deserialize, Serialize};

use crate::DaemonError;

/// Storage engine serving the maps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Persistent LMDB environment in `data_dir`.
    #[default]
    Lmdb,
    /// Volatile in-memory maps, lost on exit.
    Memory,
}

/// Configuration for a MapKeeper daemon.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub backend: BackendKind,

    /// Address the RPC server binds to.
    #[serde(default = "default_rpc_host")]
    pub rpc_host: IpAddr,

    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Attempts per store operation before giving up on contention.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,

    /// Interval between periodic checkpoints.
    #[serde(default = "default_checkpoint_interval_ms")]
    pub checkpoint_interval_ms: u64,

    /// Maximum size of the LMDB memory map in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    #[serde(default = "default_max_maps")]
    pub max_maps: u32,

    #[serde(default = "default_max_readers")]
    pub max_readers: u32,

    /// Fsync every commit. When false, only checkpoints flush.
    #[serde(default = "default_true")]
    pub sync_on_commit: bool,

    /// Log output format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Defaults ───────────────────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./mapkeeper_data")
}

fn default_rpc_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_rpc_port() -> u16 {
    9090
}

fn default_retry_budget() -> u32 {
    DEFAULT_RETRY_BUDGET
}

fn default_checkpoint_interval_ms() -> u64 {
    1000
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_max_maps() -> u32 {
    128
}

fn default_max_readers() -> u32 {
    126
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, DaemonError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DaemonError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, DaemonError> {
        toml::from_str(s).map_err(|e| DaemonError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, DaemonError> {
        toml::to_string_pretty(self).map_err(|e| DaemonError::Config(e.to_string()))
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), DaemonError> {
        if self.retry_budget == 0 {
            return Err(DaemonError::Config("retry_budget must be at least 1".into()));
        }
        if self.checkpoint_interval_ms == 0 {
            return Err(DaemonError::Config(
                "checkpoint_interval_ms must be at least 1".into(),
            ));
        }
        if self.max_maps == 0 {
            return Err(DaemonError::Config("max_maps must be at least 1".into()));
        }
        Ok(())
    }

    pub fn rpc_addr(&self) -> SocketAddr {
        SocketAddr::new(self.rpc_host, self.rpc_port)
    }

    pub fn environment_config(&self) -> EnvironmentConfig {
        EnvironmentConfig {
            home_dir: self.data_dir.clone(),
            map_size: self.map_size,
            max_maps: self.max_maps,
            max_readers: self.max_readers,
            sync_on_commit: self.sync_on_commit,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: BackendKind::default(),
            rpc_host: default_rpc_host(),
            rpc_port: default_rpc_port(),
            retry_budget: default_retry_budget(),
            checkpoint_interval_ms: default_checkpoint_interval_ms(),
            map_size: default_map_size(),
            max_maps: default_max_maps(),
            max_readers: default_max_readers(),
            sync_on_commit: default_true(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string().expect("serialize");
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.rpc_port, config.rpc_port);
        assert_eq!(parsed.backend, config.backend);
        assert_eq!(parsed.rpc_host, config.rpc_host);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.rpc_port, 9090);
        assert_eq!(config.retry_budget, 100);
        assert_eq!(config.checkpoint_interval_ms, 1000);
        assert_eq!(config.backend, BackendKind::Lmdb);
        assert_eq!(config.log_format, LogFormat::Human);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            rpc_port = 9999
            backend = "memory"
            log_format = "json"
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.rpc_port, 9999);
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_level, "info"); // default
    }

    #[test]
    fn zero_retry_budget_is_rejected() {
        let config = NodeConfig::from_toml_str("retry_budget = 0").expect("should parse");
        assert!(matches!(config.validate(), Err(DaemonError::Config(_))));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file(std::path::Path::new("/nonexistent/mapkeeper.toml"));
        assert!(matches!(result, Err(DaemonError::Config(_))));
    }

    #[test]
    fn environment_config_follows_node_config() {
        let config = NodeConfig {
            data_dir: PathBuf::from("/tmp/mk"),
            sync_on_commit: false,
            ..NodeConfig::default()
        };
        let env = config.environment_config();
        assert_eq!(env.home_dir, PathBuf::from("/tmp/mk"));
        assert!(!env.sync_on_commit);
    }
}
