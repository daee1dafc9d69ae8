//! LanWatch store: device records and the authorized roster.
//!
//! The discovery engine treats storage as two small collaborators: a
//! key-value record store keyed by MAC, and a read-only roster of
//! authorized devices. This crate defines both traits plus an in-memory
//! backend and a JSON-file backend.

pub mod file;
pub mod memory;
pub mod store;

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use lanwatch_core::MacAddress;
use serde::{Deserialize, Serialize};

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use store::{AuthorizedRoster, RecordStore, StoreError};

// ── Roster Types ─────────────────────────────────────────────────

/// A device an operator has explicitly authorized.
///
/// Either address may be omitted; an entry authorizes any observation
/// matching the address it does carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizedDevice {
    #[serde(default)]
    pub ip: Option<Ipv4Addr>,
    #[serde(default)]
    pub mac: Option<MacAddress>,
    pub name: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub added_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Inactive entries are kept for history but authorize nothing.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl AuthorizedDevice {
    pub fn new(ip: Option<Ipv4Addr>, mac: Option<MacAddress>, name: &str) -> Self {
        Self {
            ip,
            mac,
            name: name.to_string(),
            device_type: None,
            owner: None,
            department: None,
            description: None,
            added_by: None,
            created_at: Some(Utc::now()),
            active: true,
        }
    }

    pub fn matches_ip(&self, ip: Ipv4Addr) -> bool {
        self.active && self.ip == Some(ip)
    }

    pub fn matches_mac(&self, mac: &MacAddress) -> bool {
        self.active && self.mac.as_ref() == Some(mac)
    }
}
