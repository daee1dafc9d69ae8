//! lanwatch-discover: Discovery and classification engine.
//!
//! Reads the local neighbor table, sweeps the subnet for live hosts,
//! classifies unrecognized devices by vendor and risk, and reconciles them
//! against stored records, emitting one event per observed change.

pub mod config;
pub mod error;
pub mod neighbor;
pub mod orchestrator;
pub mod prober;
pub mod reconcile;
pub mod risk;
pub mod scheduler;
pub mod sink;
pub mod vendor;
