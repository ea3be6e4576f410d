//! TCP connection enumeration.
//!
//! Each source reads the host's connection table and returns the sockets it
//! could parse. Malformed rows are skipped; failing to read the table at all is
//! an [`EnumerationError`].

pub mod procfs;
pub mod ss;

pub use procfs::ProcNetSource;
pub use ss::SsSource;

use crate::config::{ConnectionSourceKind, ConnectionsConfig};
use crate::error::EnumerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Ports treated as web traffic when none are configured.
pub const DEFAULT_WEB_PORTS: [u16; 2] = [80, 443];

/// One TCP socket from the OS connection table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTuple {
    pub local_ip: String,
    pub local_port: u16,
    pub remote_ip: String,
    pub remote_port: u16,
    /// Socket state using `ss` names (`ESTAB`, `TIME-WAIT`, ...)
    pub state: String,
}

/// Source of the current TCP connection table.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// List current TCP connections.
    async fn list_connections(&self) -> Result<Vec<ConnectionTuple>, EnumerationError>;

    /// Get the source name.
    fn name(&self) -> &'static str;
}

/// Build the source selected in configuration.
pub fn source_from_config(config: &ConnectionsConfig) -> Box<dyn ConnectionSource> {
    match config.source {
        ConnectionSourceKind::Ss => Box::new(SsSource::new(config.ss_path.clone())),
        ConnectionSourceKind::Procfs => Box::new(ProcNetSource::new(config.proc_root.clone())),
    }
}

/// Run `source` with an upper bound on how long it may take.
pub async fn list_with_timeout(
    source: &dyn ConnectionSource,
    timeout: Duration,
) -> Result<Vec<ConnectionTuple>, EnumerationError> {
    match tokio::time::timeout(timeout, source.list_connections()).await {
        Ok(result) => result,
        Err(_) => Err(EnumerationError::Timeout(timeout)),
    }
}

/// Keep connections whose local port is a web port.
pub fn filter_web(connections: &[ConnectionTuple], web_ports: &HashSet<u16>) -> Vec<ConnectionTuple> {
    connections
        .iter()
        .filter(|c| web_ports.contains(&c.local_port))
        .cloned()
        .collect()
}
