//! Configuration types for the network monitor.

use crate::classifier::DEFAULT_CACHE_SIZE;
use crate::connections::DEFAULT_WEB_PORTS;
use crate::ledger::{DEFAULT_MAX_CLIENTS, DEFAULT_MAX_EVENTS_PER_CLIENT};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the network monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkMonitorConfig {
    /// User-agent classification settings
    pub classifier: ClassifierConfig,

    /// Request ledger limits
    pub ledger: LedgerConfig,

    /// Connection enumeration settings
    pub connections: ConnectionsConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Access gating for query routes
    pub auth: AuthConfig,

    /// Report debug mode on the root route and log extra startup detail
    pub debug: bool,
}

impl Default for NetworkMonitorConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            ledger: LedgerConfig::default(),
            connections: ConnectionsConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            debug: false,
        }
    }
}

/// Classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Maximum memoized user agents
    pub cache_size: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

/// Request ledger limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Events kept per client before the oldest are dropped
    pub max_events_per_client: usize,

    /// Distinct clients kept before the least recently seen is dropped
    pub max_clients: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_events_per_client: DEFAULT_MAX_EVENTS_PER_CLIENT,
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }
}

/// Where connection tuples come from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionSourceKind {
    /// Run `ss -tn`
    #[default]
    Ss,
    /// Read `/proc/net/tcp` and `/proc/net/tcp6`
    Procfs,
}

/// Connection enumeration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionsConfig {
    /// Connection table source
    pub source: ConnectionSourceKind,

    /// Path or name of the `ss` binary
    pub ss_path: String,

    /// Root of the proc filesystem
    pub proc_root: PathBuf,

    /// Local ports counted as web connections
    pub web_ports: Vec<u16>,

    /// Maximum time for one enumeration in milliseconds
    pub timeout_ms: u64,
}

impl ConnectionsConfig {
    pub fn web_port_set(&self) -> HashSet<u16> {
        self.web_ports.iter().copied().collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            source: ConnectionSourceKind::default(),
            ss_path: "ss".to_string(),
            proc_root: PathBuf::from("/proc"),
            web_ports: DEFAULT_WEB_PORTS.to_vec(),
            timeout_ms: 2000,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Access gating for the query API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Required API key; gating is off when unset
    pub api_key: Option<String>,

    /// Header carrying the API key
    pub header: String,

    /// Client networks allowed to query (CIDR); empty allows all
    pub allowed_networks: Vec<String>,
}

impl AuthConfig {
    /// Parse `allowed_networks`, skipping invalid entries.
    ///
    /// Bare addresses are accepted as single-host networks.
    pub fn parsed_networks(&self) -> Vec<IpNet> {
        self.allowed_networks
            .iter()
            .filter_map(|raw| {
                let parsed = raw
                    .parse::<IpNet>()
                    .ok()
                    .or_else(|| raw.parse::<std::net::IpAddr>().ok().map(IpNet::from));
                if parsed.is_none() {
                    tracing::warn!(network = %raw, "Ignoring invalid allowed network");
                }
                parsed
            })
            .collect()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            header: "x-api-key".to_string(),
            allowed_networks: vec![],
        }
    }
}
