//! Risk assessment for unauthorized devices.
//!
//! An ordered rule chain over vendor and hostname; the first matching rule
//! sets the level, and a device that matches nothing is `Medium`.

use lanwatch_core::{DiscoveryRecord, RiskLevel};

/// Level assigned when no rule matches.
pub const DEFAULT_RISK: RiskLevel = RiskLevel::Medium;

/// A single named rule in the chain.
pub struct RiskRule {
    pub name: &'static str,
    pub level: RiskLevel,
    matches: fn(vendor: &str, hostname: Option<&str>) -> bool,
}

impl RiskRule {
    pub fn matches(&self, vendor: &str, hostname: Option<&str>) -> bool {
        (self.matches)(vendor, hostname)
    }
}

const VIRTUALIZATION_HINTS: &[&str] = &["vm", "virtual", "qemu", "xen"];
const MOBILE_HOSTNAME_HINTS: &[&str] = &["android", "iphone", "ipad"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|n| haystack.contains(n))
}

fn is_virtualization_vendor(vendor: &str, _hostname: Option<&str>) -> bool {
    contains_any(vendor, VIRTUALIZATION_HINTS)
}

fn is_mobile_hostname(_vendor: &str, hostname: Option<&str>) -> bool {
    hostname.is_some_and(|h| contains_any(h, MOBILE_HOSTNAME_HINTS))
}

/// The fixed evaluation order.
pub const RULES: &[RiskRule] = &[
    RiskRule {
        name: "virtualization-vendor",
        level: RiskLevel::High,
        matches: is_virtualization_vendor,
    },
    RiskRule {
        name: "mobile-hostname",
        level: RiskLevel::Low,
        matches: is_mobile_hostname,
    },
];

/// The first rule that matches, if any.
pub fn matching_rule(vendor: &str, hostname: Option<&str>) -> Option<&'static RiskRule> {
    RULES.iter().find(|r| r.matches(vendor, hostname))
}

/// Assess a device from its vendor and hostname. Total: always yields a level.
pub fn assess(vendor: &str, hostname: Option<&str>) -> RiskLevel {
    matching_rule(vendor, hostname).map_or(DEFAULT_RISK, |r| r.level)
}

pub fn assess_record(record: &DiscoveryRecord) -> RiskLevel {
    assess(&record.vendor, record.hostname.as_deref())
}
