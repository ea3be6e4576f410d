//! Connection enumeration from `/proc/net/tcp` and `/proc/net/tcp6`.
//!
//! Addresses in these tables are hex dumps of the kernel's network-order
//! words, printed as native integers; ports are host-order hex. Listening and
//! closed sockets are left out so the result lines up with `ss -tn`.

use super::{ConnectionSource, ConnectionTuple};
use crate::error::EnumerationError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Reads the kernel TCP tables under a proc root (normally `/proc`).
pub struct ProcNetSource {
    root: PathBuf,
}

impl ProcNetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read_table(path: &Path) -> Result<String, EnumerationError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| EnumerationError::Read {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl Default for ProcNetSource {
    fn default() -> Self {
        Self::new("/proc")
    }
}

#[async_trait]
impl ConnectionSource for ProcNetSource {
    async fn list_connections(&self) -> Result<Vec<ConnectionTuple>, EnumerationError> {
        let net = self.root.join("net");

        let mut connections = parse_proc_net_tcp(&Self::read_table(&net.join("tcp")).await?);

        // Hosts without IPv6 have no tcp6 table
        match Self::read_table(&net.join("tcp6")).await {
            Ok(table) => connections.extend(parse_proc_net_tcp(&table)),
            Err(EnumerationError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        debug!(
            source = "procfs",
            connections = connections.len(),
            "Enumerated TCP connections"
        );

        Ok(connections)
    }

    fn name(&self) -> &'static str {
        "procfs"
    }
}

/// Parse the contents of `/proc/net/tcp` or `/proc/net/tcp6`.
pub fn parse_proc_net_tcp(table: &str) -> Vec<ConnectionTuple> {
    table
        .lines()
        .filter_map(|line| {
            let parsed = parse_row(line);
            if parsed.is_none() {
                trace!(line, "Skipping proc tcp row");
            }
            parsed.flatten()
        })
        .collect()
}

/// `None` for unparsable rows, `Some(None)` for rows deliberately dropped.
fn parse_row(line: &str) -> Option<Option<ConnectionTuple>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 || !parts[0].ends_with(':') {
        return None;
    }

    let state = state_name(u8::from_str_radix(parts[3], 16).ok()?);
    let (local_ip, local_port) = decode_endpoint(parts[1])?;
    let (remote_ip, remote_port) = decode_endpoint(parts[2])?;

    if matches!(state, "LISTEN" | "UNCONN") {
        return Some(None);
    }

    Some(Some(ConnectionTuple {
        local_ip,
        local_port,
        remote_ip,
        remote_port,
        state: state.to_string(),
    }))
}

fn decode_endpoint(endpoint: &str) -> Option<(String, u16)> {
    let (addr, port) = endpoint.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;

    let ip = match addr.len() {
        8 => Ipv4Addr::from(decode_word(addr)?).to_string(),
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
                chunk.copy_from_slice(&decode_word(addr.get(i * 8..i * 8 + 8)?)?);
            }
            Ipv6Addr::from(octets).to_string()
        }
        _ => return None,
    };

    Some((ip, port))
}

/// One 32-bit address word, back to network byte order.
fn decode_word(hex: &str) -> Option<[u8; 4]> {
    u32::from_str_radix(hex, 16).ok().map(u32::to_ne_bytes)
}

/// Kernel TCP state code to the name `ss` prints.
fn state_name(code: u8) -> &'static str {
    match code {
        0x01 => "ESTAB",
        0x02 => "SYN-SENT",
        0x03 => "SYN-RECV",
        0x04 => "FIN-WAIT-1",
        0x05 => "FIN-WAIT-2",
        0x06 => "TIME-WAIT",
        0x07 => "UNCONN",
        0x08 => "CLOSE-WAIT",
        0x09 => "LAST-ACK",
        0x0A => "LISTEN",
        0x0B => "CLOSING",
        _ => "UNKNOWN",
    }
}
