//! One discovery cycle, end to end.
//!
//! `Idle → Scanning → Merging → Reconciling → Emitting → Idle`
//!
//! Scanning reads the neighbor table and sweeps the subnet concurrently.
//! Merging turns parsed entries into deduplicated observations annotated
//! with reachability. Reconciling is the only phase that touches the record
//! store, and a cycle lock keeps two cycles from ever reconciling at once.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use ipnet::Ipv4Net;
use lanwatch_core::{CycleReport, MacAddress};
use lanwatch_store::{AuthorizedRoster, RecordStore};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::DiscoverConfig;
use crate::error::{DiscoverError, Result};
use crate::neighbor::{self, NeighborEntry, NeighborSource};
use crate::prober::{sweep_targets, LivenessProber};
use crate::reconcile::{self, Observation, ReconcilePolicy};
use crate::sink::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Scanning,
    Merging,
    Reconciling,
    Emitting,
}

/// Per-cycle tunables, usually derived from [`DiscoverConfig`].
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub subnet: Ipv4Net,
    /// Bound on the neighbor-table read; expiry aborts the cycle.
    pub neighbor_timeout: Duration,
    pub per_host_timeout: Duration,
    pub overall_budget: Duration,
    pub policy: ReconcilePolicy,
}

impl CycleSettings {
    pub fn from_config(config: &DiscoverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            subnet: config.subnet_net()?,
            neighbor_timeout: config.neighbor_timeout(),
            per_host_timeout: config.per_host_timeout(),
            overall_budget: config.overall_budget(),
            policy: ReconcilePolicy {
                reassess_risk: config.reassess_risk,
            },
        })
    }
}

pub struct DiscoveryOrchestrator {
    settings: CycleSettings,
    neighbors: Arc<dyn NeighborSource>,
    prober: LivenessProber,
    roster: Arc<dyn AuthorizedRoster>,
    store: Arc<dyn RecordStore>,
    sinks: Vec<Arc<dyn EventSink>>,
    phase: RwLock<CyclePhase>,
    cycle_lock: Mutex<()>,
}

/// Returns the orchestrator to `Idle` however the cycle ends.
struct PhaseGuard<'a>(&'a RwLock<CyclePhase>);

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut phase) = self.0.write() {
            *phase = CyclePhase::Idle;
        }
    }
}

impl DiscoveryOrchestrator {
    pub fn new(
        settings: CycleSettings,
        neighbors: Arc<dyn NeighborSource>,
        prober: LivenessProber,
        roster: Arc<dyn AuthorizedRoster>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            settings,
            neighbors,
            prober,
            roster,
            store,
            sinks: Vec::new(),
            phase: RwLock::new(CyclePhase::Idle),
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase.read().map(|p| *p).unwrap_or(CyclePhase::Idle)
    }

    fn enter(&self, cycle_id: Uuid, next: CyclePhase) {
        if let Ok(mut phase) = self.phase.write() {
            *phase = next;
        }
        tracing::debug!(cycle_id = %cycle_id, phase = ?next, "Cycle phase");
    }

    /// Run one cycle. Fails only if the neighbor table cannot be read or
    /// another cycle is already running.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _cycle = self
            .cycle_lock
            .try_lock()
            .map_err(|_| DiscoverError::CycleInProgress)?;
        let _reset = PhaseGuard(&self.phase);

        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let subnet = self.settings.subnet;

        tracing::info!(
            cycle_id = %cycle_id,
            subnet = %subnet,
            source = %self.neighbors.describe(),
            "Starting discovery cycle"
        );

        // ── Scanning ──
        self.enter(cycle_id, CyclePhase::Scanning);
        let targets = sweep_targets(&subnet);
        let neighbors = Arc::clone(&self.neighbors);
        // On timeout the blocking read keeps running detached; the cycle ends.
        let read = tokio::time::timeout(
            self.settings.neighbor_timeout,
            tokio::task::spawn_blocking(move || neighbors.read_table()),
        );
        let sweep = self.prober.probe(
            &targets,
            self.settings.per_host_timeout,
            self.settings.overall_budget,
        );
        let (raw, reachable) = tokio::join!(read, sweep);

        let raw = match raw {
            Ok(Ok(Ok(text))) => text,
            Ok(Ok(Err(e))) => {
                tracing::error!(cycle_id = %cycle_id, error = %e, "Neighbor table unavailable, aborting cycle");
                return Err(e);
            }
            Ok(Err(e)) => {
                tracing::error!(cycle_id = %cycle_id, error = %e, "Neighbor table read panicked, aborting cycle");
                return Err(DiscoverError::NeighborSource {
                    command: self.neighbors.describe(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                let timeout_ms = self.settings.neighbor_timeout.as_millis();
                tracing::error!(cycle_id = %cycle_id, timeout_ms, "Neighbor table read timed out, aborting cycle");
                return Err(DiscoverError::NeighborSource {
                    command: self.neighbors.describe(),
                    reason: format!("no output within {timeout_ms} ms"),
                });
            }
        };

        // ── Merging ──
        self.enter(cycle_id, CyclePhase::Merging);
        let entries = neighbor::parse_entries(&raw);
        let parsed = entries.len();
        let observations = merge(&subnet, entries, &reachable);

        tracing::info!(
            cycle_id = %cycle_id,
            parsed,
            observed = observations.len(),
            reachable = reachable.len(),
            "Scan merged"
        );

        // ── Reconciling ──
        self.enter(cycle_id, CyclePhase::Reconciling);
        let now = Utc::now();
        let mut events = Vec::new();
        let mut seen: HashSet<MacAddress> = HashSet::new();
        let mut authorized = 0u32;
        let mut skipped = 0u32;

        for obs in &observations {
            let mac = obs.identity.mac;
            seen.insert(mac);

            match self.roster.is_authorized(&obs.identity) {
                Ok(true) => {
                    authorized += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(cycle_id = %cycle_id, mac = %mac, error = %e, "Roster lookup failed, skipping device");
                    skipped += 1;
                    continue;
                }
            }

            let existing = match self.store.find_by_mac(&mac) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(cycle_id = %cycle_id, mac = %mac, error = %e, "Record lookup failed, skipping device");
                    skipped += 1;
                    continue;
                }
            };

            let outcome = reconcile::reconcile(obs, existing, now, self.settings.policy);
            if let Err(e) = self.store.upsert(&outcome.record) {
                tracing::warn!(cycle_id = %cycle_id, mac = %mac, error = %e, "Record upsert failed, skipping device");
                skipped += 1;
                continue;
            }
            events.extend(outcome.events);
        }

        match self.store.list() {
            Ok(records) => {
                for mut record in records {
                    if seen.contains(&record.mac()) {
                        continue;
                    }
                    let Some(event) = reconcile::mark_absent(&mut record) else {
                        continue;
                    };
                    match self.store.upsert(&record) {
                        Ok(()) => events.push(event),
                        Err(e) => {
                            tracing::warn!(cycle_id = %cycle_id, mac = %record.mac(), error = %e, "Could not mark absent device offline");
                            skipped += 1;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(cycle_id = %cycle_id, error = %e, "Record listing failed, absent devices left unchanged");
            }
        }

        // ── Emitting ──
        self.enter(cycle_id, CyclePhase::Emitting);
        let report = CycleReport {
            cycle_id,
            subnet: subnet.to_string(),
            started_at,
            finished_at: Utc::now(),
            observed: observations.len() as u32,
            reachable: reachable.len() as u32,
            authorized,
            skipped,
            events,
        };

        for sink in &self.sinks {
            if let Err(e) = sink.deliver(&report) {
                tracing::warn!(cycle_id = %cycle_id, error = %e, "Event delivery failed");
            }
        }

        tracing::info!(
            cycle_id = %cycle_id,
            observed = report.observed,
            authorized = report.authorized,
            new = report.new_unauthorized_count(),
            events = report.events.len(),
            skipped = report.skipped,
            duration_ms = report.duration_ms(),
            "Discovery cycle complete"
        );

        Ok(report)
    }
}

/// Turn parsed entries into one observation per MAC.
///
/// Entries outside the subnet and group (multicast/broadcast) MACs are
/// dropped. When a MAC appears more than once, the first entry wins unless
/// a later one is reachable and the first is not.
pub fn merge(
    subnet: &Ipv4Net,
    entries: Vec<NeighborEntry>,
    reachable: &HashSet<Ipv4Addr>,
) -> Vec<Observation> {
    let mut observations: Vec<Observation> = Vec::new();
    let mut index: HashMap<MacAddress, usize> = HashMap::new();

    for entry in entries {
        let identity = entry.identity;
        if !subnet.contains(&identity.ip) || identity.mac.is_multicast() {
            tracing::trace!(ip = %identity.ip, mac = %identity.mac, "Ignoring neighbor entry");
            continue;
        }

        let obs = Observation {
            identity,
            hostname: entry.hostname,
            reachable: reachable.contains(&identity.ip),
        };

        match index.get(&identity.mac) {
            Some(&i) => {
                let current = &mut observations[i];
                if obs.reachable && !current.reachable {
                    current.identity = obs.identity;
                    current.reachable = true;
                }
                if current.hostname.is_none() {
                    current.hostname = obs.hostname;
                }
            }
            None => {
                index.insert(identity.mac, observations.len());
                observations.push(obs);
            }
        }
    }

    observations
}
