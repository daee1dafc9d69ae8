//! Device events produced by a discovery cycle.
//!
//! Events are the only artifact a cycle hands to downstream consumers
//! (persistence, notification). They are delivered in the order produced.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{DeviceIdentity, DeviceStatus, DeviceType, RiskLevel};

/// A change observed for a single device, tagged by type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type")]
pub enum DeviceEvent {
    /// A MAC not on the roster was seen for the first time.
    NewUnauthorized {
        identity: DeviceIdentity,
        hostname: Option<String>,
        vendor: String,
        device_type: DeviceType,
        status: DeviceStatus,
        risk_level: RiskLevel,
    },
    /// A known device answered on a different address.
    IpChanged {
        identity: DeviceIdentity,
        previous_ip: Ipv4Addr,
    },
    StatusChanged {
        identity: DeviceIdentity,
        from: DeviceStatus,
        to: DeviceStatus,
    },
    RiskChanged {
        identity: DeviceIdentity,
        from: RiskLevel,
        to: RiskLevel,
    },
}

impl DeviceEvent {
    pub fn identity(&self) -> &DeviceIdentity {
        match self {
            Self::NewUnauthorized { identity, .. }
            | Self::IpChanged { identity, .. }
            | Self::StatusChanged { identity, .. }
            | Self::RiskChanged { identity, .. } => identity,
        }
    }

    /// Short tag, matching the serialized `event_type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewUnauthorized { .. } => "NewUnauthorized",
            Self::IpChanged { .. } => "IpChanged",
            Self::StatusChanged { .. } => "StatusChanged",
            Self::RiskChanged { .. } => "RiskChanged",
        }
    }
}

/// Summary of one completed discovery cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub subnet: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Distinct devices taken from the neighbor table this cycle.
    pub observed: u32,
    /// Addresses that answered the liveness sweep.
    pub reachable: u32,
    /// Observed devices that matched the authorized roster.
    pub authorized: u32,
    /// Devices whose processing was skipped because of a store failure.
    pub skipped: u32,
    pub events: Vec<DeviceEvent>,
}

impl CycleReport {
    pub fn new_unauthorized_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::NewUnauthorized { .. }))
            .count()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::parse("192.168.1.77", "aa:bb:cc:dd:ee:ff").unwrap()
    }

    #[test]
    fn event_payload_tags() {
        let event = DeviceEvent::IpChanged {
            identity: identity(),
            previous_ip: Ipv4Addr::new(192, 168, 1, 50),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"IpChanged\""));
        assert!(json.contains("\"mac\":\"aa:bb:cc:dd:ee:ff\""));
        assert!(json.contains("\"previous_ip\":\"192.168.1.50\""));
        assert_eq!(event.kind(), "IpChanged");
    }

    #[test]
    fn event_identity_accessor() {
        let event = DeviceEvent::StatusChanged {
            identity: identity(),
            from: DeviceStatus::Online,
            to: DeviceStatus::Offline,
        };
        assert_eq!(event.identity().ip, Ipv4Addr::new(192, 168, 1, 77));
    }

    #[test]
    fn report_counts_new_devices() {
        let now = Utc::now();
        let report = CycleReport {
            cycle_id: Uuid::new_v4(),
            subnet: "192.168.1.0/24".to_string(),
            started_at: now,
            finished_at: now,
            observed: 2,
            reachable: 1,
            authorized: 0,
            skipped: 0,
            events: vec![
                DeviceEvent::NewUnauthorized {
                    identity: identity(),
                    hostname: None,
                    vendor: "Unknown".to_string(),
                    device_type: DeviceType::Computer,
                    status: DeviceStatus::Online,
                    risk_level: RiskLevel::Medium,
                },
                DeviceEvent::RiskChanged {
                    identity: identity(),
                    from: RiskLevel::Medium,
                    to: RiskLevel::High,
                },
            ],
        };
        assert_eq!(report.new_unauthorized_count(), 1);
        assert_eq!(report.duration_ms(), 0);
    }
}
