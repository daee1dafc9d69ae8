//! File-system backed store.
//!
//! Records and the roster live under a single directory:
//! ```text
//! {root}/
//!   roster.json            # [AuthorizedDevice, ...], edited by operators
//!   records/
//!     aabbccddeeff.json    # one DiscoveryRecord per MAC
//! ```
//!
//! The roster is re-read on every lookup so edits take effect on the next
//! cycle without a restart.

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use lanwatch_core::{DiscoveryRecord, MacAddress};

use crate::store::{AuthorizedRoster, RecordStore, StoreError};
use crate::AuthorizedDevice;

const ROSTER_FILE: &str = "roster.json";
const RECORDS_DIR: &str = "records";

pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at the given directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(RECORDS_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Replace the roster file. Used by tooling and tests; scanning never calls it.
    pub fn write_roster(&self, roster: &[AuthorizedDevice]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(roster)?;
        write_atomic(&self.root.join(ROSTER_FILE), json.as_bytes())
    }

    fn record_path(&self, mac: &MacAddress) -> PathBuf {
        let key: String = mac.octets().iter().map(|o| format!("{o:02x}")).collect();
        self.root.join(RECORDS_DIR).join(format!("{key}.json"))
    }

    fn load_roster(&self) -> Result<Vec<AuthorizedDevice>, StoreError> {
        let path = self.root.join(ROSTER_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&path)?;
        serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn read_record(path: &Path) -> Result<DiscoveryRecord, StoreError> {
    let json = fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl RecordStore for JsonFileStore {
    fn find_by_mac(&self, mac: &MacAddress) -> Result<Option<DiscoveryRecord>, StoreError> {
        let path = self.record_path(mac);
        if !path.exists() {
            return Ok(None);
        }
        read_record(&path).map(Some)
    }

    fn upsert(&self, record: &DiscoveryRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.mac());
        let json = serde_json::to_string_pretty(record)?;
        write_atomic(&path, json.as_bytes())?;

        tracing::debug!(
            mac = %record.mac(),
            path = %path.display(),
            "Record saved"
        );

        Ok(())
    }

    fn list(&self) -> Result<Vec<DiscoveryRecord>, StoreError> {
        let mut records = Vec::new();

        for entry in fs::read_dir(self.root.join(RECORDS_DIR))?.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }

        Ok(records)
    }
}

impl AuthorizedRoster for JsonFileStore {
    fn exists_by_ip(&self, ip: Ipv4Addr) -> Result<bool, StoreError> {
        Ok(self.load_roster()?.iter().any(|d| d.matches_ip(ip)))
    }

    fn exists_by_mac(&self, mac: &MacAddress) -> Result<bool, StoreError> {
        Ok(self.load_roster()?.iter().any(|d| d.matches_mac(mac)))
    }
}
