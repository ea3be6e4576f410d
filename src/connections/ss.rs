//! Connection enumeration via the `ss` utility.

use super::{ConnectionSource, ConnectionTuple};
use crate::error::EnumerationError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, trace};

/// Runs `ss -tn` and parses its table.
pub struct SsSource {
    program: String,
}

impl SsSource {
    /// Create a source that runs `program` (usually `"ss"`).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SsSource {
    fn default() -> Self {
        Self::new("ss")
    }
}

#[async_trait]
impl ConnectionSource for SsSource {
    async fn list_connections(&self) -> Result<Vec<ConnectionTuple>, EnumerationError> {
        let output = Command::new(&self.program)
            .arg("-tn")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| EnumerationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EnumerationError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let connections = parse_ss_output(&stdout);
        debug!(
            source = "ss",
            connections = connections.len(),
            "Enumerated TCP connections"
        );

        Ok(connections)
    }

    fn name(&self) -> &'static str {
        "ss"
    }
}

/// Parse `ss -tn` output.
///
/// Expected columns: `State Recv-Q Send-Q Local:Port Peer:Port`. Rows that do
/// not fit, including the header, are skipped.
pub fn parse_ss_output(output: &str) -> Vec<ConnectionTuple> {
    output
        .lines()
        .filter_map(|line| {
            let parsed = parse_ss_line(line);
            if parsed.is_none() && !line.trim().is_empty() {
                trace!(line, "Skipping unparsable ss row");
            }
            parsed
        })
        .collect()
}

fn parse_ss_line(line: &str) -> Option<ConnectionTuple> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return None;
    }

    let (local_ip, local_port) = split_endpoint(parts[3])?;
    let (remote_ip, remote_port) = split_endpoint(parts[4])?;

    Some(ConnectionTuple {
        local_ip,
        local_port,
        remote_ip,
        remote_port,
        state: parts[0].to_string(),
    })
}

/// Split `addr:port`, unwrapping bracketed IPv6 addresses.
fn split_endpoint(endpoint: &str) -> Option<(String, u16)> {
    let (ip, port) = endpoint.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;

    let ip = ip
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(ip);
    if ip.is_empty() {
        return None;
    }

    Some((ip.to_string(), port))
}
