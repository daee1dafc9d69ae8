//! Neighbor (ARP) table parsing and the sources that produce the raw text.
//!
//! Parsing is a pure text transform: every line either matches one of the
//! known entry shapes or contributes nothing. Supported shapes:
//!
//! ```text
//! host.lan (192.168.1.20) at aa:bb:cc:dd:ee:ff [ether] on eth0     # BSD/Linux arp -a
//!   192.168.1.20          aa-bb-cc-dd-ee-ff     dynamic             # Windows arp -a
//! 192.168.1.20 dev eth0 lladdr aa:bb:cc:dd:ee:ff REACHABLE          # iproute2 ip neigh
//! ```

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::Command;

use lanwatch_core::{DeviceIdentity, MacAddress};

use crate::error::{DiscoverError, Result};

/// One parsed neighbor-table line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    pub identity: DeviceIdentity,
    /// Name printed by `arp -a` before the address, when it is not `?`.
    pub hostname: Option<String>,
}

/// Parse raw neighbor-table text into identities. Never fails.
pub fn parse(raw: &str) -> Vec<DeviceIdentity> {
    parse_entries(raw).into_iter().map(|e| e.identity).collect()
}

/// Parse raw neighbor-table text, keeping any hostname hints.
pub fn parse_entries(raw: &str) -> Vec<NeighborEntry> {
    raw.lines().filter_map(parse_line).collect()
}

/// Parse a single line in any supported shape.
pub fn parse_line(line: &str) -> Option<NeighborEntry> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }

    parse_bsd(&parts)
        .or_else(|| parse_ip_neigh(&parts))
        .or_else(|| parse_windows(&parts))
}

/// `hostname (IP) at MAC ...`
fn parse_bsd(parts: &[&str]) -> Option<NeighborEntry> {
    let idx = parts
        .iter()
        .position(|p| p.starts_with('(') && p.ends_with(')'))?;
    if parts.get(idx + 1) != Some(&"at") {
        return None;
    }

    let ip: Ipv4Addr = parts[idx].trim_matches(|c| c == '(' || c == ')').parse().ok()?;
    let mac = MacAddress::parse(parts.get(idx + 2)?)?;

    let hostname = idx
        .checked_sub(1)
        .map(|h| parts[h])
        .filter(|h| *h != "?")
        .map(String::from);

    Some(NeighborEntry {
        identity: DeviceIdentity::new(ip, mac),
        hostname,
    })
}

/// `IP dev IFACE lladdr MAC STATE`
fn parse_ip_neigh(parts: &[&str]) -> Option<NeighborEntry> {
    let ip: Ipv4Addr = parts[0].parse().ok()?;
    let lladdr_idx = parts.iter().position(|&p| p == "lladdr")?;
    let mac = MacAddress::parse(parts.get(lladdr_idx + 1)?)?;

    Some(NeighborEntry {
        identity: DeviceIdentity::new(ip, mac),
        hostname: None,
    })
}

/// `IP  MAC  TYPE`
fn parse_windows(parts: &[&str]) -> Option<NeighborEntry> {
    let ip: Ipv4Addr = parts[0].parse().ok()?;
    let mac = MacAddress::parse(parts[1])?;

    Some(NeighborEntry {
        identity: DeviceIdentity::new(ip, mac),
        hostname: None,
    })
}

// ── Sources ──────────────────────────────────────────────────────

/// Produces raw neighbor-table text. Failure aborts the discovery cycle.
pub trait NeighborSource: Send + Sync {
    fn read_table(&self) -> Result<String>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Runs a system command (default `arp -a`) and returns its stdout.
pub struct CommandNeighborSource {
    command: String,
    args: Vec<String>,
}

impl CommandNeighborSource {
    pub fn new(command: &str, args: &[String]) -> Self {
        Self {
            command: command.to_string(),
            args: args.to_vec(),
        }
    }
}

impl NeighborSource for CommandNeighborSource {
    fn read_table(&self) -> Result<String> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .output()
            .map_err(|e| DiscoverError::NeighborSource {
                command: self.describe(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(DiscoverError::NeighborCommandFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Reads a captured neighbor table from disk. Useful for replaying a
/// table taken on another host.
pub struct FileNeighborSource {
    path: PathBuf,
}

impl FileNeighborSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl NeighborSource for FileNeighborSource {
    fn read_table(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| DiscoverError::NeighborSource {
            command: self.describe(),
            reason: e.to_string(),
        })
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
