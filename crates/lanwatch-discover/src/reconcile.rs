//! Merge observed identities into discovery records.
//!
//! Reconciliation is keyed by MAC: the caller looks up the existing record
//! for the observed MAC and hands it in; this module decides the updated
//! record and the events describing the change. No I/O happens here.

use chrono::{DateTime, Utc};
use lanwatch_core::{DeviceEvent, DeviceIdentity, DeviceStatus, DiscoveryRecord};

use crate::{risk, vendor};

/// One device seen in the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub identity: DeviceIdentity,
    pub hostname: Option<String>,
    /// Answered the liveness sweep this cycle.
    pub reachable: bool,
}

impl Observation {
    fn status(&self) -> DeviceStatus {
        if self.reachable {
            DeviceStatus::Online
        } else {
            DeviceStatus::Offline
        }
    }
}

/// Knobs that change how existing records are updated.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcilePolicy {
    /// Recompute risk on every re-observation (skipped for investigated records).
    pub reassess_risk: bool,
}

/// The record to store and the events explaining how it changed.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub record: DiscoveryRecord,
    pub events: Vec<DeviceEvent>,
}

/// Merge one observation with the stored record for its MAC, if any.
pub fn reconcile(
    observation: &Observation,
    existing: Option<DiscoveryRecord>,
    now: DateTime<Utc>,
    policy: ReconcilePolicy,
) -> Reconciliation {
    match existing {
        None => first_detection(observation, now),
        Some(record) => re_observation(observation, record, now, policy),
    }
}

fn first_detection(observation: &Observation, now: DateTime<Utc>) -> Reconciliation {
    let mut record = DiscoveryRecord::first_sighting(observation.identity, now);
    record.hostname = observation.hostname.clone();
    record.vendor = vendor::vendor_for(&observation.identity.mac);
    record.device_type = vendor::device_type(&record.vendor, record.hostname.as_deref());
    record.risk_level = risk::assess_record(&record);
    record.status = observation.status();

    let event = DeviceEvent::NewUnauthorized {
        identity: record.identity,
        hostname: record.hostname.clone(),
        vendor: record.vendor.clone(),
        device_type: record.device_type,
        status: record.status,
        risk_level: record.risk_level,
    };

    Reconciliation {
        record,
        events: vec![event],
    }
}

fn re_observation(
    observation: &Observation,
    mut record: DiscoveryRecord,
    now: DateTime<Utc>,
    policy: ReconcilePolicy,
) -> Reconciliation {
    let mut events = Vec::new();

    record.last_seen = now.max(record.first_seen);
    record.detection_count = record.detection_count.saturating_add(1);

    if record.identity.ip != observation.identity.ip {
        let previous_ip = record.identity.ip;
        record.identity = observation.identity;
        events.push(DeviceEvent::IpChanged {
            identity: record.identity,
            previous_ip,
        });
    }

    let status = observation.status();
    if record.status != status {
        events.push(DeviceEvent::StatusChanged {
            identity: record.identity,
            from: record.status,
            to: status,
        });
        record.status = status;
    }

    if record.hostname.is_none() {
        record.hostname = observation.hostname.clone();
    }

    if policy.reassess_risk && !record.investigated {
        if observation.hostname.is_some() {
            record.hostname = observation.hostname.clone();
        }
        record.device_type = vendor::device_type(&record.vendor, record.hostname.as_deref());

        let assessed = risk::assess_record(&record);
        if assessed != record.risk_level {
            events.push(DeviceEvent::RiskChanged {
                identity: record.identity,
                from: record.risk_level,
                to: assessed,
            });
            record.risk_level = assessed;
        }
    }

    Reconciliation { record, events }
}

/// Bookkeeping for a stored device that was not observed this cycle.
///
/// An `Online` record goes `Offline`; anything else is left alone. The
/// detection count and timestamps are untouched.
pub fn mark_absent(record: &mut DiscoveryRecord) -> Option<DeviceEvent> {
    if record.status != DeviceStatus::Online {
        return None;
    }
    record.status = DeviceStatus::Offline;
    Some(DeviceEvent::StatusChanged {
        identity: record.identity,
        from: DeviceStatus::Online,
        to: DeviceStatus::Offline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use lanwatch_core::{DeviceType, RiskLevel};
    use std::net::Ipv4Addr;

    fn observe(ip: &str, mac: &str, reachable: bool) -> Observation {
        Observation {
            identity: DeviceIdentity::parse(ip, mac).unwrap(),
            hostname: None,
            reachable,
        }
    }

    fn stored(ip: &str, mac: &str, count: u32, status: DeviceStatus) -> DiscoveryRecord {
        let seen = Utc::now() - TimeDelta::try_hours(1).unwrap();
        let mut r = DiscoveryRecord::first_sighting(DeviceIdentity::parse(ip, mac).unwrap(), seen);
        r.detection_count = count;
        r.status = status;
        r
    }

    #[test]
    fn test_fresh_mac_creates_record() {
        let now = Utc::now();
        let obs = observe("192.168.1.20", "aa:bb:cc:dd:ee:ff", true);
        let out = reconcile(&obs, None, now, ReconcilePolicy::default());

        assert_eq!(out.record.detection_count, 1);
        assert_eq!(out.record.first_seen, now);
        assert_eq!(out.record.last_seen, now);
        assert_eq!(out.record.status, DeviceStatus::Online);
        assert_eq!(out.record.vendor, vendor::RANDOMIZED_VENDOR);
        assert_eq!(out.record.device_type, DeviceType::Computer);
        assert_eq!(out.record.risk_level, RiskLevel::Medium);
        assert_eq!(out.events.len(), 1);
        assert!(matches!(
            out.events[0],
            DeviceEvent::NewUnauthorized {
                status: DeviceStatus::Online,
                risk_level: RiskLevel::Medium,
                ..
            }
        ));
    }

    #[test]
    fn test_fresh_unreachable_mac_is_offline() {
        let obs = observe("192.168.1.20", "aa:bb:cc:dd:ee:ff", false);
        let out = reconcile(&obs, None, Utc::now(), ReconcilePolicy::default());
        assert_eq!(out.record.status, DeviceStatus::Offline);
    }

    #[test]
    fn test_fresh_vm_is_classified_high() {
        let mut obs = observe("192.168.1.30", "00:50:56:01:02:03", true);
        obs.hostname = Some("build-agent".to_string());
        let out = reconcile(&obs, None, Utc::now(), ReconcilePolicy::default());

        assert_eq!(out.record.vendor, "VMware");
        assert_eq!(out.record.device_type, DeviceType::VirtualMachine);
        assert_eq!(out.record.risk_level, RiskLevel::High);
        assert_eq!(out.record.hostname.as_deref(), Some("build-agent"));
    }

    #[test]
    fn test_reobservation_increments_count() {
        let existing = stored("192.168.1.20", "aa:bb:cc:dd:ee:ff", 4, DeviceStatus::Online);
        let first_seen = existing.first_seen;
        let now = Utc::now();

        let obs = observe("192.168.1.20", "aa:bb:cc:dd:ee:ff", true);
        let out = reconcile(&obs, Some(existing), now, ReconcilePolicy::default());

        assert_eq!(out.record.detection_count, 5);
        assert_eq!(out.record.first_seen, first_seen);
        assert_eq!(out.record.last_seen, now);
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_ip_change_is_reported() {
        let existing = stored("192.168.1.50", "aa:bb:cc:dd:ee:ff", 1, DeviceStatus::Online);
        let obs = observe("192.168.1.77", "aa:bb:cc:dd:ee:ff", true);
        let out = reconcile(&obs, Some(existing), Utc::now(), ReconcilePolicy::default());

        assert_eq!(out.record.identity.ip, Ipv4Addr::new(192, 168, 1, 77));
        assert_eq!(out.record.detection_count, 2);
        assert_eq!(
            out.events,
            vec![DeviceEvent::IpChanged {
                identity: obs.identity,
                previous_ip: Ipv4Addr::new(192, 168, 1, 50),
            }]
        );
    }

    #[test]
    fn test_status_change_only_on_transition() {
        let existing = stored("192.168.1.20", "aa:bb:cc:dd:ee:ff", 2, DeviceStatus::Online);
        let obs = observe("192.168.1.20", "aa:bb:cc:dd:ee:ff", false);
        let out = reconcile(&obs, Some(existing), Utc::now(), ReconcilePolicy::default());

        assert_eq!(out.record.status, DeviceStatus::Offline);
        assert_eq!(
            out.events,
            vec![DeviceEvent::StatusChanged {
                identity: obs.identity,
                from: DeviceStatus::Online,
                to: DeviceStatus::Offline,
            }]
        );

        // Still offline next cycle: no event
        let again = reconcile(&obs, Some(out.record), Utc::now(), ReconcilePolicy::default());
        assert!(again.events.is_empty());
        assert_eq!(again.record.detection_count, 4);
    }

    #[test]
    fn test_last_seen_never_precedes_first_seen() {
        let existing = stored("192.168.1.20", "aa:bb:cc:dd:ee:ff", 1, DeviceStatus::Offline);
        let skewed = existing.first_seen - TimeDelta::try_minutes(5).unwrap();
        let obs = observe("192.168.1.20", "aa:bb:cc:dd:ee:ff", false);
        let out = reconcile(&obs, Some(existing), skewed, ReconcilePolicy::default());
        assert!(out.record.last_seen >= out.record.first_seen);
    }

    #[test]
    fn test_risk_kept_by_default() {
        let mut existing = stored("192.168.1.20", "aa:bb:cc:dd:ee:ff", 1, DeviceStatus::Online);
        existing.risk_level = RiskLevel::Critical;

        let mut obs = observe("192.168.1.20", "aa:bb:cc:dd:ee:ff", true);
        obs.hostname = Some("android-5521".to_string());
        let out = reconcile(&obs, Some(existing), Utc::now(), ReconcilePolicy::default());

        assert_eq!(out.record.risk_level, RiskLevel::Critical);
        assert_eq!(out.record.hostname.as_deref(), Some("android-5521"));
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_reassess_emits_risk_change() {
        let existing = stored("192.168.1.20", "aa:bb:cc:dd:ee:ff", 1, DeviceStatus::Online);
        let mut obs = observe("192.168.1.20", "aa:bb:cc:dd:ee:ff", true);
        obs.hostname = Some("android-5521".to_string());

        let policy = ReconcilePolicy { reassess_risk: true };
        let out = reconcile(&obs, Some(existing.clone()), Utc::now(), policy);
        assert_eq!(out.record.risk_level, RiskLevel::Low);
        assert_eq!(out.record.device_type, DeviceType::Android);
        assert_eq!(
            out.events,
            vec![DeviceEvent::RiskChanged {
                identity: obs.identity,
                from: RiskLevel::Medium,
                to: RiskLevel::Low,
            }]
        );

        // Analyst-reviewed records keep their level
        let mut reviewed = existing;
        reviewed.investigated = true;
        reviewed.risk_level = RiskLevel::Critical;
        let out = reconcile(&obs, Some(reviewed), Utc::now(), policy);
        assert_eq!(out.record.risk_level, RiskLevel::Critical);
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_mark_absent() {
        let mut online = stored("192.168.1.20", "aa:bb:cc:dd:ee:ff", 3, DeviceStatus::Online);
        let event = mark_absent(&mut online);
        assert_eq!(online.status, DeviceStatus::Offline);
        assert_eq!(online.detection_count, 3);
        assert!(matches!(
            event,
            Some(DeviceEvent::StatusChanged {
                to: DeviceStatus::Offline,
                ..
            })
        ));

        let mut unknown = stored("192.168.1.21", "aa:bb:cc:dd:ee:01", 1, DeviceStatus::Unknown);
        assert!(mark_absent(&mut unknown).is_none());
        assert_eq!(unknown.status, DeviceStatus::Unknown);

        assert!(mark_absent(&mut online).is_none());
    }
}
