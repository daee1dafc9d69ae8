//! lanwatch-core: Shared types for the LanWatch discovery engine.
//!
//! This crate provides the foundational types used across all LanWatch components:
//! - Device identities (IPv4 + normalized MAC) and discovery records
//! - Device events emitted by a discovery cycle
//! - Common error types

pub mod error;
pub mod events;
pub mod types;

pub use error::CoreError;
pub use events::{CycleReport, DeviceEvent};
pub use types::{
    Authorization, DeviceIdentity, DeviceStatus, DeviceType, DiscoveryRecord, MacAddress,
    RiskLevel,
};
