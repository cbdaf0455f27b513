//! Configuration loading for a peerfs node.
//!
//! Configuration is loaded from a TOML file (default: `peerfs.toml`). Every
//! section and key is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sync_client::TcpTransportConfig;
use sync_core::{PeerRegistry, RegistryError};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "peerfs.toml";

/// Root configuration for a node.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node configuration.
    pub node: NodeSettings,
    /// Network bounds.
    pub network: NetworkConfig,
    /// Sync scheduler configuration.
    pub scheduler: SchedulerConfig,
    /// Activity log configuration.
    pub activity_log: ActivityLogConfig,
}

/// Node configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// JSON peer list (default: config/peers.json).
    pub peers_file: PathBuf,
    /// Replicated directory (default: shared).
    pub shared_root: PathBuf,
    /// Largest accepted request or reply in bytes (default: 64MB).
    pub max_message_size: usize,
}

/// Network configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Dial timeout for requests in milliseconds (default: 1500).
    pub dial_timeout_ms: u64,
    /// Dial timeout for liveness probes in milliseconds (default: 1000).
    pub probe_timeout_ms: u64,
    /// Bound on one request/reply exchange in milliseconds (default: 30000).
    pub io_timeout_ms: u64,
}

/// Sync scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Enable the periodic tick (default: true).
    pub enabled: bool,
    /// Tick interval in seconds (default: 5).
    pub interval_secs: u64,
}

/// Activity log configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActivityLogConfig {
    /// Record completed actions (default: false).
    pub enabled: bool,
    /// JSON-lines file (default: peerfs-activity.jsonl).
    pub path: PathBuf,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            peers_file: PathBuf::from("config/peers.json"),
            shared_root: PathBuf::from("shared"),
            max_message_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            dial_timeout_ms: 1500,
            probe_timeout_ms: 1000,
            io_timeout_ms: 30_000,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
        }
    }
}

impl Default for ActivityLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("peerfs-activity.jsonl"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `explicit` if given, else `peerfs.toml` if present, else defaults.
    ///
    /// An explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load the peer list named by `node.peers_file`.
    pub fn load_peers(&self) -> Result<PeerRegistry, ConfigError> {
        let path = &self.node.peers_file;
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        PeerRegistry::from_json(&content).map_err(|e| ConfigError::Peers {
            path: path.clone(),
            source: e,
        })
    }

    /// Transport bounds derived from `[network]` and `node.max_message_size`.
    pub fn transport(&self) -> TcpTransportConfig {
        TcpTransportConfig {
            dial_timeout: Duration::from_millis(self.network.dial_timeout_ms),
            probe_timeout: Duration::from_millis(self.network.probe_timeout_ms),
            io_timeout: Duration::from_millis(self.network.io_timeout_ms),
            max_message_size: self.node.max_message_size,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse the TOML configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// The peer list is malformed or has no single local entry.
    #[error("invalid peer list {path}: {source}")]
    Peers {
        /// Path to the peer list.
        path: PathBuf,
        /// What is wrong with it.
        source: RegistryError,
    },
}
