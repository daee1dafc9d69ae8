//! In-memory backend, used for one-shot runs and tests.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard};

use lanwatch_core::{DiscoveryRecord, MacAddress};

use crate::store::{AuthorizedRoster, RecordStore, StoreError};
use crate::AuthorizedDevice;

/// Records and roster held in process memory.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<MacAddress, DiscoveryRecord>>,
    roster: Mutex<Vec<AuthorizedDevice>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roster(roster: Vec<AuthorizedDevice>) -> Self {
        Self {
            records: Mutex::default(),
            roster: Mutex::new(roster),
        }
    }

    /// Add a roster entry. Stands in for the operator-facing authorization action.
    pub fn authorize(&self, device: AuthorizedDevice) -> Result<(), StoreError> {
        lock(&self.roster)?.push(device);
        Ok(())
    }

    pub fn len(&self) -> usize {
        lock(&self.records).map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    m.lock()
        .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
}

impl RecordStore for MemoryStore {
    fn find_by_mac(&self, mac: &MacAddress) -> Result<Option<DiscoveryRecord>, StoreError> {
        Ok(lock(&self.records)?.get(mac).cloned())
    }

    fn upsert(&self, record: &DiscoveryRecord) -> Result<(), StoreError> {
        lock(&self.records)?.insert(record.mac(), record.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<DiscoveryRecord>, StoreError> {
        Ok(lock(&self.records)?.values().cloned().collect())
    }
}

impl AuthorizedRoster for MemoryStore {
    fn exists_by_ip(&self, ip: Ipv4Addr) -> Result<bool, StoreError> {
        Ok(lock(&self.roster)?.iter().any(|d| d.matches_ip(ip)))
    }

    fn exists_by_mac(&self, mac: &MacAddress) -> Result<bool, StoreError> {
        Ok(lock(&self.roster)?.iter().any(|d| d.matches_mac(mac)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lanwatch_core::DeviceIdentity;

    fn record(ip: &str, mac: &str) -> DiscoveryRecord {
        DiscoveryRecord::first_sighting(DeviceIdentity::parse(ip, mac).unwrap(), Utc::now())
    }

    #[test]
    fn upsert_replaces_by_mac() {
        let store = MemoryStore::new();
        let mut r = record("10.0.0.5", "aa:bb:cc:dd:ee:ff");
        store.upsert(&r).unwrap();

        r.identity.ip = Ipv4Addr::new(10, 0, 0, 6);
        r.detection_count = 2;
        store.upsert(&r).unwrap();

        assert_eq!(store.len(), 1);
        let found = store.find_by_mac(&r.mac()).unwrap().unwrap();
        assert_eq!(found.identity.ip, Ipv4Addr::new(10, 0, 0, 6));
        assert_eq!(found.detection_count, 2);
    }

    #[test]
    fn find_missing_returns_none() {
        let store = MemoryStore::new();
        let mac: MacAddress = "00:00:00:00:00:01".parse().unwrap();
        assert!(store.find_by_mac(&mac).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn roster_matches_ip_or_mac() {
        let mac: MacAddress = "00:23:24:aa:bb:cc".parse().unwrap();
        let store = MemoryStore::with_roster(vec![
            AuthorizedDevice::new(None, Some(mac), "office-mac"),
            AuthorizedDevice::new(Some(Ipv4Addr::new(192, 168, 1, 10)), None, "nas"),
        ]);

        let by_mac = DeviceIdentity::new(Ipv4Addr::new(192, 168, 1, 99), mac);
        assert!(store.is_authorized(&by_mac).unwrap());

        let by_ip = DeviceIdentity::parse("192.168.1.10", "11:22:33:44:55:66").unwrap();
        assert!(store.is_authorized(&by_ip).unwrap());

        let stranger = DeviceIdentity::parse("192.168.1.11", "11:22:33:44:55:66").unwrap();
        assert!(!store.is_authorized(&stranger).unwrap());
    }

    #[test]
    fn inactive_roster_entry_authorizes_nothing() {
        let mac: MacAddress = "00:23:24:aa:bb:cc".parse().unwrap();
        let mut retired = AuthorizedDevice::new(None, Some(mac), "retired-laptop");
        retired.active = false;
        let store = MemoryStore::with_roster(vec![retired]);

        assert!(!store.exists_by_mac(&mac).unwrap());

        store
            .authorize(AuthorizedDevice::new(None, Some(mac), "reissued-laptop"))
            .unwrap();
        assert!(store.exists_by_mac(&mac).unwrap());
    }
}
