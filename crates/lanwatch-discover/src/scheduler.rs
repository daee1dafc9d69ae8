//! Periodic cycle trigger.
//!
//! Ticks at the configured interval and runs one discovery cycle per tick.
//! Ticks that arrive while a cycle is still running are skipped, never queued.

use std::sync::Arc;

use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::error::{DiscoverError, Result};
use crate::orchestrator::DiscoveryOrchestrator;

/// The scheduler drives the orchestrator on a fixed period.
pub struct ScanScheduler {
    orchestrator: Arc<DiscoveryOrchestrator>,
    period: Duration,
}

impl ScanScheduler {
    pub fn new(orchestrator: Arc<DiscoveryOrchestrator>, period: Duration) -> Self {
        Self {
            orchestrator,
            period,
        }
    }

    /// Run until the runtime shuts down.
    pub async fn run(&self) -> Result<()> {
        self.run_for(None).await
    }

    /// Run at most `max_ticks` cycles (or forever when `None`).
    pub async fn run_for(&self, max_ticks: Option<u64>) -> Result<()> {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            period_secs = self.period.as_secs(),
            subnet = %self.orchestrator.settings().subnet,
            "Scheduler started"
        );

        let mut ticks = 0u64;
        loop {
            if max_ticks.is_some_and(|max| ticks >= max) {
                return Ok(());
            }
            ticker.tick().await;
            ticks += 1;

            tracing::info!(tick = ticks, "Scheduled cycle triggered");
            self.trigger().await;
        }
    }

    /// Run one cycle and log the outcome; errors never stop the schedule.
    pub async fn trigger(&self) {
        match self.orchestrator.run_cycle().await {
            Ok(report) => {
                tracing::debug!(cycle_id = %report.cycle_id, events = report.events.len(), "Scheduled cycle finished");
            }
            Err(DiscoverError::CycleInProgress) => {
                tracing::warn!("Previous cycle still running, skipping this trigger");
            }
            Err(e) => {
                tracing::error!(error = %e, "Scheduled cycle failed");
            }
        }
    }
}
