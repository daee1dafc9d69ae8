//! Bounded, cancellable liveness sweep.
//!
//! One probe task per address is spawned into a `JoinSet`; a semaphore caps
//! how many run at once. Each probe is bounded by the per-host timeout and
//! the whole sweep by the overall budget. When the budget expires, every
//! outstanding task is aborted and its address counts as unreachable.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};

/// A single-host reachability check.
#[async_trait]
pub trait Probe: Send + Sync {
    /// `true` if the host answered. Errors are reported as `false`.
    async fn is_reachable(&self, ip: Ipv4Addr, timeout: Duration) -> bool;
}

/// Sends one ICMP echo through the system `ping` binary.
///
/// The child is killed when the probe future is dropped, so a cancelled
/// sweep does not leave processes behind.
pub struct PingProbe {
    ping_path: String,
}

impl PingProbe {
    pub fn new(ping_path: &str) -> Self {
        Self {
            ping_path: ping_path.to_string(),
        }
    }

    fn args(ip: Ipv4Addr, timeout: Duration) -> Vec<String> {
        let ms = timeout.as_millis().max(1);
        if cfg!(target_os = "windows") {
            vec!["-n".into(), "1".into(), "-w".into(), ms.to_string(), ip.to_string()]
        } else if cfg!(target_os = "macos") {
            vec!["-c".into(), "1".into(), "-W".into(), ms.to_string(), ip.to_string()]
        } else {
            // iputils takes whole seconds
            let secs = timeout.as_secs().max(1);
            vec!["-c".into(), "1".into(), "-W".into(), secs.to_string(), ip.to_string()]
        }
    }
}

#[async_trait]
impl Probe for PingProbe {
    async fn is_reachable(&self, ip: Ipv4Addr, timeout: Duration) -> bool {
        let status = Command::new(&self.ping_path)
            .args(Self::args(ip, timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;

        match status {
            Ok(s) => s.success(),
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "Ping could not be started");
                false
            }
        }
    }
}

/// Every host address of the subnet (network and broadcast excluded).
pub fn sweep_targets(net: &Ipv4Net) -> HashSet<Ipv4Addr> {
    net.hosts().collect()
}

/// Fans probes out over a bounded worker pool.
#[derive(Clone)]
pub struct LivenessProber {
    probe: Arc<dyn Probe>,
    max_concurrent: usize,
}

impl LivenessProber {
    pub fn new(probe: Arc<dyn Probe>, max_concurrent: usize) -> Self {
        Self {
            probe,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Probe `addresses` and return the subset that answered.
    ///
    /// Always returns within roughly `overall_budget`; addresses still
    /// pending at expiry are treated as unreachable.
    pub async fn probe(
        &self,
        addresses: &HashSet<Ipv4Addr>,
        per_host_timeout: Duration,
        overall_budget: Duration,
    ) -> HashSet<Ipv4Addr> {
        let deadline = Instant::now() + overall_budget;
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for &ip in addresses {
            let probe = Arc::clone(&self.probe);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                match timeout(per_host_timeout, probe.is_reachable(ip, per_host_timeout)).await {
                    Ok(true) => Some(ip),
                    _ => None,
                }
            });
        }

        let mut reachable = HashSet::new();
        let mut completed = 0usize;

        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(result))) => {
                    completed += 1;
                    if let Some(ip) = result {
                        reachable.insert(ip);
                    }
                }
                Ok(Some(Err(e))) => {
                    completed += 1;
                    tracing::warn!(error = %e, "Probe task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        outstanding = tasks.len(),
                        completed,
                        budget_ms = overall_budget.as_millis() as u64,
                        "Sweep budget expired, cancelling outstanding probes"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        tracing::debug!(
            targets = addresses.len(),
            completed,
            reachable = reachable.len(),
            "Liveness sweep finished"
        );

        reachable
    }
}
