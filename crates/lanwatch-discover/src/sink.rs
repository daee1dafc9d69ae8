//! Event sinks: where a finished cycle's events are delivered.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use lanwatch_core::{CycleReport, DeviceEvent};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{DiscoverError, Result};

/// Receives the ordered events of each cycle. Retry is the sink's business;
/// a failed delivery is logged and does not fail the cycle.
pub trait EventSink: Send + Sync {
    fn deliver(&self, report: &CycleReport) -> Result<()>;
}

/// Writes every event to the tracing log.
pub struct LogSink;

impl EventSink for LogSink {
    fn deliver(&self, report: &CycleReport) -> Result<()> {
        for event in &report.events {
            let identity = event.identity();
            match event {
                DeviceEvent::NewUnauthorized {
                    vendor,
                    device_type,
                    status,
                    risk_level,
                    ..
                } => tracing::warn!(
                    cycle_id = %report.cycle_id,
                    ip = %identity.ip,
                    mac = %identity.mac,
                    vendor = %vendor,
                    device_type = %device_type,
                    status = %status,
                    risk = %risk_level,
                    "Unauthorized device detected"
                ),
                DeviceEvent::IpChanged { previous_ip, .. } => tracing::info!(
                    cycle_id = %report.cycle_id,
                    mac = %identity.mac,
                    from = %previous_ip,
                    to = %identity.ip,
                    "Device changed address"
                ),
                DeviceEvent::StatusChanged { from, to, .. } => tracing::info!(
                    cycle_id = %report.cycle_id,
                    ip = %identity.ip,
                    mac = %identity.mac,
                    from = %from,
                    to = %to,
                    "Device status changed"
                ),
                DeviceEvent::RiskChanged { from, to, .. } => tracing::warn!(
                    cycle_id = %report.cycle_id,
                    ip = %identity.ip,
                    mac = %identity.mac,
                    from = %from,
                    to = %to,
                    "Device risk level changed"
                ),
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct EventLine<'a> {
    cycle_id: Uuid,
    #[serde(flatten)]
    event: &'a DeviceEvent,
}

/// Appends one JSON object per event to a file.
pub struct JsonLinesSink {
    path: PathBuf,
    // serializes appends from concurrent deliveries
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

impl EventSink for JsonLinesSink {
    fn deliver(&self, report: &CycleReport) -> Result<()> {
        if report.events.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for event in &report.events {
            let line = EventLine {
                cycle_id: report.cycle_id,
                event,
            };
            serde_json::to_writer(&mut buf, &line).map_err(|e| DiscoverError::Sink(e.to_string()))?;
            buf.push(b'\n');
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| DiscoverError::Sink("event log lock poisoned".to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&buf)?;

        Ok(())
    }
}
