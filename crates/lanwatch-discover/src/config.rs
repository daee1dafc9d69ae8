//! Configuration for the lanwatch-discover engine.

use std::time::Duration;

use ipnet::Ipv4Net;
use serde::Deserialize;

use crate::error::{DiscoverError, Result};

/// Smallest prefix accepted for the sweep (a /20 is 4094 hosts).
pub const MIN_PREFIX_LEN: u8 = 20;

/// Top-level discover configuration.
///
/// Loaded from `lanwatch.toml` `[discover]` section or
/// `LANWATCH_DISCOVER__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// Subnet to watch, in CIDR notation (default: "192.168.1.0/24").
    #[serde(default = "default_subnet")]
    pub subnet: String,

    /// Command that prints the neighbor table (default: "arp").
    #[serde(default = "default_neighbor_command")]
    pub neighbor_command: String,

    /// Arguments for the neighbor table command (default: ["-a"]).
    #[serde(default = "default_neighbor_args")]
    pub neighbor_args: Vec<String>,

    /// Upper bound on reading the neighbor table, in milliseconds. `arp -a`
    /// resolves a hostname per entry and can stall on slow DNS.
    #[serde(default = "default_neighbor_timeout_ms")]
    pub neighbor_timeout_ms: u64,

    /// Path to the ping binary used for liveness probes.
    #[serde(default = "default_ping_path")]
    pub ping_path: String,

    /// Per-host probe timeout in milliseconds.
    #[serde(default = "default_per_host_timeout_ms")]
    pub per_host_timeout_ms: u64,

    /// Budget for the whole liveness sweep in milliseconds.
    #[serde(default = "default_overall_budget_ms")]
    pub overall_budget_ms: u64,

    /// Maximum probes in flight at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_probes: usize,

    /// Seconds between scheduled cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Directory for the JSON record store and roster.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Optional JSON-lines file receiving every emitted event.
    #[serde(default)]
    pub events_path: Option<String>,

    /// Re-assess risk whenever a device is re-observed. Off by default:
    /// risk is assigned at first detection and analyst overrides stick.
    #[serde(default)]
    pub reassess_risk: bool,
}

fn default_subnet() -> String {
    "192.168.1.0/24".to_string()
}

fn default_neighbor_command() -> String {
    "arp".to_string()
}

fn default_neighbor_args() -> Vec<String> {
    vec!["-a".to_string()]
}

fn default_neighbor_timeout_ms() -> u64 {
    10_000
}

fn default_ping_path() -> String {
    "ping".to_string()
}

fn default_per_host_timeout_ms() -> u64 {
    1000
}

fn default_overall_budget_ms() -> u64 {
    5000
}

fn default_max_concurrent() -> usize {
    32
}

fn default_interval() -> u64 {
    300
}

fn default_data_dir() -> String {
    "./lanwatch-data".to_string()
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            subnet: default_subnet(),
            neighbor_command: default_neighbor_command(),
            neighbor_args: default_neighbor_args(),
            neighbor_timeout_ms: default_neighbor_timeout_ms(),
            ping_path: default_ping_path(),
            per_host_timeout_ms: default_per_host_timeout_ms(),
            overall_budget_ms: default_overall_budget_ms(),
            max_concurrent_probes: default_max_concurrent(),
            interval_secs: default_interval(),
            data_dir: default_data_dir(),
            events_path: None,
            reassess_risk: false,
        }
    }
}

impl DiscoverConfig {
    /// Load from `{file_prefix}.toml` (optional) and the environment.
    ///
    /// A missing `[discover]` section yields the defaults.
    pub fn load(file_prefix: &str) -> Result<Self> {
        Self::load_with_env(file_prefix, None)
    }

    /// `env` replaces the process environment when set.
    fn load_with_env(file_prefix: &str, env: Option<config::Map<String, String>>) -> Result<Self> {
        // LANWATCH_DISCOVER__SUBNET -> discover.subnet
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("LANWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        match cfg.get::<DiscoverConfig>("discover") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => Ok(DiscoverConfig::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn per_host_timeout(&self) -> Duration {
        Duration::from_millis(self.per_host_timeout_ms)
    }

    pub fn neighbor_timeout(&self) -> Duration {
        Duration::from_millis(self.neighbor_timeout_ms)
    }

    pub fn overall_budget(&self) -> Duration {
        Duration::from_millis(self.overall_budget_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// The configured subnet, normalized to its network address.
    pub fn subnet_net(&self) -> Result<Ipv4Net> {
        let net: Ipv4Net = self
            .subnet
            .trim()
            .parse()
            .map_err(|e| DiscoverError::Config(format!("invalid subnet {:?}: {e}", self.subnet)))?;
        Ok(net.trunc())
    }

    /// Reject settings that would let a sweep hang past the next trigger.
    pub fn validate(&self) -> Result<()> {
        let net = self.subnet_net()?;
        if net.prefix_len() < MIN_PREFIX_LEN {
            return Err(DiscoverError::Config(format!(
                "subnet {net} is too large; prefix must be /{MIN_PREFIX_LEN} or longer"
            )));
        }
        if self.per_host_timeout_ms == 0 || self.overall_budget_ms == 0 || self.neighbor_timeout_ms == 0 {
            return Err(DiscoverError::Config(
                "probe timeout, sweep budget and neighbor timeout must be non-zero".to_string(),
            ));
        }
        if self.max_concurrent_probes == 0 {
            return Err(DiscoverError::Config(
                "max_concurrent_probes must be at least 1".to_string(),
            ));
        }
        if self.neighbor_timeout() >= self.interval() {
            return Err(DiscoverError::Config(format!(
                "neighbor timeout ({} ms) must be shorter than the cycle interval ({} s)",
                self.neighbor_timeout_ms, self.interval_secs
            )));
        }
        if self.overall_budget() >= self.interval() {
            return Err(DiscoverError::Config(format!(
                "sweep budget ({} ms) must be shorter than the cycle interval ({} s)",
                self.overall_budget_ms, self.interval_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoverConfig::default();
        assert_eq!(config.subnet, "192.168.1.0/24");
        assert_eq!(config.neighbor_command, "arp");
        assert_eq!(config.neighbor_args, vec!["-a"]);
        assert_eq!(config.neighbor_timeout(), Duration::from_secs(10));
        assert_eq!(config.per_host_timeout(), Duration::from_secs(1));
        assert_eq!(config.overall_budget(), Duration::from_secs(5));
        assert_eq!(config.max_concurrent_probes, 32);
        assert_eq!(config.interval_secs, 300);
        assert!(!config.reassess_risk);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_subnet_is_truncated() {
        let config = DiscoverConfig {
            subnet: "192.168.1.77/24".to_string(),
            ..Default::default()
        };
        assert_eq!(config.subnet_net().unwrap().to_string(), "192.168.1.0/24");
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let bad_subnet = DiscoverConfig {
            subnet: "192.168.1.0".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad_subnet.validate(), Err(DiscoverError::Config(_))));

        let too_wide = DiscoverConfig {
            subnet: "10.0.0.0/8".to_string(),
            ..Default::default()
        };
        assert!(too_wide.validate().is_err());

        let budget_exceeds_period = DiscoverConfig {
            overall_budget_ms: 60_000,
            interval_secs: 30,
            ..Default::default()
        };
        assert!(budget_exceeds_period.validate().is_err());

        let neighbor_timeout_exceeds_period = DiscoverConfig {
            neighbor_timeout_ms: 30_000,
            interval_secs: 30,
            ..Default::default()
        };
        assert!(neighbor_timeout_exceeds_period.validate().is_err());

        let no_workers = DiscoverConfig {
            max_concurrent_probes: 0,
            ..Default::default()
        };
        assert!(no_workers.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lanwatch.toml");
        std::fs::write(
            &path,
            r#"
[discover]
subnet = "10.20.30.0/24"
overall_budget_ms = 3000
max_concurrent_probes = 16
reassess_risk = true
"#,
        )
        .unwrap();

        let prefix = dir.path().join("lanwatch");
        let config = DiscoverConfig::load_with_env(prefix.to_str().unwrap(), Some(Default::default())).unwrap();
        assert_eq!(config.subnet, "10.20.30.0/24");
        assert_eq!(config.overall_budget_ms, 3000);
        assert_eq!(config.max_concurrent_probes, 16);
        assert!(config.reassess_risk);
        // untouched fields keep their defaults
        assert_eq!(config.per_host_timeout_ms, 1000);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = DiscoverConfig::load_with_env(prefix.to_str().unwrap(), Some(Default::default())).unwrap();
        assert_eq!(config.subnet, "192.168.1.0/24");
    }

    fn env(vars: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn test_env_overrides_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = DiscoverConfig::load_with_env(
            prefix.to_str().unwrap(),
            env(&[
                ("LANWATCH_DISCOVER__SUBNET", "10.9.8.0/24"),
                ("LANWATCH_DISCOVER__OVERALL_BUDGET_MS", "1234"),
            ]),
        )
        .unwrap();
        assert_eq!(config.subnet, "10.9.8.0/24");
        assert_eq!(config.overall_budget_ms, 1234);
        assert_eq!(config.per_host_timeout_ms, 1000);
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lanwatch.toml"),
            "[discover]\nsubnet = \"10.20.30.0/24\"\nmax_concurrent_probes = 16\n",
        )
        .unwrap();

        let prefix = dir.path().join("lanwatch");
        let config = DiscoverConfig::load_with_env(
            prefix.to_str().unwrap(),
            env(&[
                ("LANWATCH_DISCOVER__SUBNET", "172.16.4.0/22"),
                ("UNRELATED_SUBNET", "1.2.3.0/24"),
            ]),
        )
        .unwrap();
        assert_eq!(config.subnet, "172.16.4.0/22");
        assert_eq!(config.max_concurrent_probes, 16);
    }
}
