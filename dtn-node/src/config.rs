//! Node configuration.
//!
//! A small JSON file, all fields optional:
//!
//! ```text
//! {
//!   "name": "gateway",
//!   "route_config_path": "/etc/opendtn/dtn_router/routes",
//!   "key_store_path": "/etc/opendtn/keys",
//!   "lock_timeout_usecs": 100000,
//!   "workers": 4,
//!   "queue_capacity": 1024
//! }
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::key_store::KeyStoreConfig;
use crate::routing::RoutingConfig;

/// Configuration load error.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config I/O error: {}", e),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name, used in logs.
    pub name: String,
    pub route_config_path: PathBuf,
    pub key_store_path: PathBuf,
    /// Shared-state lock acquisition timeout, in microseconds.
    pub lock_timeout_usecs: u64,
    /// Worker thread count; 0 means one per available core.
    pub workers: usize,
    /// Inbound frame queue capacity.
    pub queue_capacity: usize,
    /// UDP listen address for inbound frames, e.g. "0.0.0.0:4556".
    /// None leaves the daemon without a network ingress.
    pub listen: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let routing = RoutingConfig::default();
        let keys = KeyStoreConfig::default();
        NodeConfig {
            name: routing.name.clone(),
            route_config_path: routing.path,
            key_store_path: keys.path,
            lock_timeout_usecs: routing.lock_timeout.as_micros() as u64,
            workers: 0,
            queue_capacity: 1024,
            listen: None,
        }
    }
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_micros(self.lock_timeout_usecs)
    }

    pub fn routing_config(&self) -> RoutingConfig {
        RoutingConfig {
            path: self.route_config_path.clone(),
            name: self.name.clone(),
            lock_timeout: self.lock_timeout(),
        }
    }

    pub fn key_store_config(&self) -> KeyStoreConfig {
        KeyStoreConfig {
            path: self.key_store_path.clone(),
            lock_timeout: self.lock_timeout(),
        }
    }
}
