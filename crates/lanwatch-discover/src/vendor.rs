//! MAC vendor lookup and device-type inference.
//!
//! Vendor lookup checks a short override table first, then the IEEE OUI
//! database embedded by `mac_oui`. Both lookups are deterministic.

use std::sync::OnceLock;

use lanwatch_core::types::UNKNOWN_VENDOR;
use lanwatch_core::{DeviceType, MacAddress};
use mac_oui::Oui;

/// Vendor label for locally administered MACs with no known vendor.
pub const RANDOMIZED_VENDOR: &str = "Private (Randomized MAC)";

/// Short labels that take priority over the registry's company names.
/// The risk rules key on these (e.g. "VMware", "QEMU").
const OUI_OVERRIDES: &[([u8; 3], &str)] = &[
    ([0x00, 0x50, 0x56], "VMware"),
    ([0x00, 0x0c, 0x29], "VMware"),
    ([0x00, 0x05, 0x69], "VMware"),
    ([0x08, 0x00, 0x27], "VirtualBox"),
    ([0x00, 0x15, 0x5d], "Microsoft"),
    ([0x00, 0x16, 0x3e], "Xen"),
    ([0x52, 0x54, 0x00], "QEMU"),
    ([0x00, 0x1b, 0x21], "Intel"),
    ([0x00, 0x23, 0x24], "Apple"),
];

/// Registry loaded on first use; `None` if the embedded database fails to load.
static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

fn oui_db() -> Option<&'static Oui> {
    OUI_DB
        .get_or_init(|| match Oui::default() {
            Ok(db) => Some(db),
            Err(e) => {
                tracing::warn!(error = ?e, "OUI database unavailable, vendor lookups limited to overrides");
                None
            }
        })
        .as_ref()
}

fn registry_vendor(mac: &MacAddress) -> Option<String> {
    match oui_db()?.lookup_by_mac(&mac.to_string()) {
        Ok(Some(entry)) => Some(entry.company_name.clone()),
        Ok(None) | Err(_) => None,
    }
}

/// Look up the vendor for a MAC's OUI, defaulting to "Unknown".
pub fn classify(mac: &MacAddress) -> String {
    let oui = mac.oui();
    if let Some((_, vendor)) = OUI_OVERRIDES.iter().find(|(prefix, _)| *prefix == oui) {
        return (*vendor).to_string();
    }
    registry_vendor(mac).unwrap_or_else(|| UNKNOWN_VENDOR.to_string())
}

/// Vendor label used on new records: the known vendor, or a randomized-MAC
/// marker for locally administered addresses nobody has registered.
pub fn vendor_for(mac: &MacAddress) -> String {
    let vendor = classify(mac);
    if vendor == UNKNOWN_VENDOR && mac.is_locally_administered() {
        RANDOMIZED_VENDOR.to_string()
    } else {
        vendor
    }
}

/// Ordered device-type rules. First match wins.
const DEVICE_TYPE_RULES: &[(DeviceType, &[&str])] = &[
    (DeviceType::Apple, &["apple", "iphone", "ipad", "macbook"]),
    (DeviceType::Android, &["samsung", "android", "pixel"]),
    (DeviceType::VirtualMachine, &["vm", "virtual", "qemu", "xen"]),
    (DeviceType::Printer, &["printer", "canon", "hp", "epson"]),
    (
        DeviceType::NetworkDevice,
        &["router", "switch", "cisco", "ubiquiti", "tp-link"],
    ),
];

/// Infer a device category from vendor and hostname (case-insensitive).
pub fn device_type(vendor: &str, hostname: Option<&str>) -> DeviceType {
    let combined = format!("{} {}", vendor, hostname.unwrap_or_default()).to_lowercase();

    DEVICE_TYPE_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| combined.contains(n)))
        .map(|(kind, _)| *kind)
        .unwrap_or(DeviceType::Computer)
}
