//! Core domain types for the LanWatch device inventory.
//!
//! A device is identified by its hardware (MAC) address; the IPv4 address is
//! a mutable attribute that may change between cycles (DHCP reassignment).

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── MAC address ───────────────────────────────────────────────────

/// A 48-bit hardware address.
///
/// Always rendered in normalized form: lowercase hex, colon separated,
/// two digits per octet (`aa:bb:cc:dd:ee:ff`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Parse a MAC written with `:` or `-` separators, in any hex case.
    ///
    /// Octets may omit their leading zero (`0:50:56:c0:0:8`, as printed by
    /// BSD `arp`). Mixed separators and anything other than exactly six
    /// octets are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let sep = if raw.contains(':') { ':' } else { '-' };
        let mut octets = [0u8; 6];
        let mut count = 0;

        for part in raw.split(sep) {
            if count == 6 || part.is_empty() || part.len() > 2 {
                return None;
            }
            if !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            octets[count] = u8::from_str_radix(part, 16).ok()?;
            count += 1;
        }

        (count == 6).then_some(Self(octets))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Organizationally unique identifier: the first three octets.
    pub fn oui(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// Group bit set: multicast or broadcast, never a single device.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Locally administered bit set (randomized or virtual interfaces).
    pub fn is_locally_administered(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

/// Normalize a MAC string to lowercase colon-separated form.
pub fn normalize_mac(raw: &str) -> Option<String> {
    MacAddress::parse(raw).map(|m| m.to_string())
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CoreError::InvalidMac(s.to_string()))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

// ── Identity ──────────────────────────────────────────────────────

/// An observed `(IPv4, MAC)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
}

impl DeviceIdentity {
    pub fn new(ip: Ipv4Addr, mac: MacAddress) -> Self {
        Self { ip, mac }
    }

    /// Build an identity from raw strings, normalizing the MAC.
    pub fn parse(ip: &str, mac: &str) -> Result<Self, CoreError> {
        let ip = ip
            .trim()
            .parse::<Ipv4Addr>()
            .map_err(|_| CoreError::InvalidIp(ip.to_string()))?;
        Ok(Self { ip, mac: mac.parse()? })
    }

    /// Same hardware, regardless of the address currently leased.
    pub fn same_device(&self, other: &DeviceIdentity) -> bool {
        self.mac == other.mac
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.ip, self.mac)
    }
}

// ── Classification enums ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        })
    }
}

/// Roster membership. Scanning never changes it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Authorization {
    Authorized,
    #[default]
    Unauthorized,
}

/// Coarse severity of an unauthorized device.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        })
    }
}

/// Device category derived from vendor and hostname.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeviceType {
    #[serde(rename = "Apple Device")]
    Apple,
    #[serde(rename = "Android Device")]
    Android,
    #[serde(rename = "Virtual Machine")]
    VirtualMachine,
    Printer,
    #[serde(rename = "Network Device")]
    NetworkDevice,
    Computer,
    #[default]
    Unknown,
}

impl DeviceType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Apple => "Apple Device",
            Self::Android => "Android Device",
            Self::VirtualMachine => "Virtual Machine",
            Self::Printer => "Printer",
            Self::NetworkDevice => "Network Device",
            Self::Computer => "Computer",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Discovery record ──────────────────────────────────────────────

/// Label used when no vendor can be determined for a MAC.
pub const UNKNOWN_VENDOR: &str = "Unknown";

/// One entry per known device, keyed by MAC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryRecord {
    pub identity: DeviceIdentity,
    pub hostname: Option<String>,
    pub vendor: String,
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub detection_count: u32,
    pub authorization: Authorization,
    /// Only meaningful while `authorization` is `Unauthorized`.
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub investigated: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DiscoveryRecord {
    /// A first sighting of an unrecognized device.
    pub fn first_sighting(identity: DeviceIdentity, seen_at: DateTime<Utc>) -> Self {
        Self {
            identity,
            hostname: None,
            vendor: UNKNOWN_VENDOR.to_string(),
            device_type: DeviceType::Unknown,
            status: DeviceStatus::Unknown,
            first_seen: seen_at,
            last_seen: seen_at,
            detection_count: 1,
            authorization: Authorization::Unauthorized,
            risk_level: RiskLevel::default(),
            investigated: false,
            notes: None,
        }
    }

    pub fn mac(&self) -> MacAddress {
        self.identity.mac
    }
}
