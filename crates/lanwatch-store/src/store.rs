//! Store traits shared by every backend.

use std::net::Ipv4Addr;

use lanwatch_core::{DeviceIdentity, DiscoveryRecord, MacAddress};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value store of discovery records, keyed by MAC.
///
/// Only the reconciling phase of a discovery cycle calls `upsert`, and
/// cycles never overlap, so implementations need no cross-call locking
/// beyond what keeps a single call consistent.
pub trait RecordStore: Send + Sync {
    /// Look up the record for a MAC, if one exists.
    fn find_by_mac(&self, mac: &MacAddress) -> Result<Option<DiscoveryRecord>, StoreError>;

    /// Insert or replace the record for `record.identity.mac`.
    fn upsert(&self, record: &DiscoveryRecord) -> Result<(), StoreError>;

    /// All stored records, in no particular order.
    fn list(&self) -> Result<Vec<DiscoveryRecord>, StoreError>;
}

/// Read-only view of the authorized-device roster.
pub trait AuthorizedRoster: Send + Sync {
    fn exists_by_ip(&self, ip: Ipv4Addr) -> Result<bool, StoreError>;

    fn exists_by_mac(&self, mac: &MacAddress) -> Result<bool, StoreError>;

    /// A device is authorized when either its address or its MAC is on the roster.
    fn is_authorized(&self, identity: &DeviceIdentity) -> Result<bool, StoreError> {
        Ok(self.exists_by_ip(identity.ip)? || self.exists_by_mac(&identity.mac)?)
    }
}
