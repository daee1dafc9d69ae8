//! CLI entry point for the lanwatch-discover engine.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use lanwatch_discover::config::DiscoverConfig;
use lanwatch_discover::neighbor::{CommandNeighborSource, FileNeighborSource, NeighborSource};
use lanwatch_discover::orchestrator::{CycleSettings, DiscoveryOrchestrator};
use lanwatch_discover::prober::{LivenessProber, PingProbe};
use lanwatch_discover::scheduler::ScanScheduler;
use lanwatch_discover::sink::{JsonLinesSink, LogSink};
use lanwatch_store::JsonFileStore;

#[derive(Parser)]
#[command(name = "lanwatch-discover")]
#[command(about = "Detect and classify unauthorized devices on the local subnet")]
struct Cli {
    /// Subnet to watch (CIDR notation, e.g., 192.168.1.0/24).
    #[arg(short, long)]
    subnet: Option<String>,

    /// Run a single discovery cycle, print its report and exit.
    #[arg(long)]
    once: bool,

    /// Run as daemon with scheduled cycles.
    #[arg(long)]
    daemon: bool,

    /// Config file prefix (default: lanwatch).
    #[arg(short, long, default_value = "lanwatch")]
    config: String,

    /// Directory holding device records and the authorized roster.
    #[arg(long)]
    data_dir: Option<String>,

    /// Append emitted events as JSON lines to this file.
    #[arg(long)]
    events: Option<String>,

    /// Read the neighbor table from a captured file instead of running `arp`.
    #[arg(long)]
    neighbor_file: Option<PathBuf>,

    /// Human-readable logs instead of JSON.
    #[arg(long)]
    plain_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.plain_logs {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    }

    let mut config = DiscoverConfig::load(&cli.config)?;
    if let Some(subnet) = &cli.subnet {
        config.subnet = subnet.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if cli.events.is_some() {
        config.events_path = cli.events.clone();
    }

    let settings = CycleSettings::from_config(&config)?;
    let store = Arc::new(JsonFileStore::open(&config.data_dir)?);
    tracing::info!(data_dir = %config.data_dir, "Record store opened");

    let neighbors: Arc<dyn NeighborSource> = match &cli.neighbor_file {
        Some(path) => Arc::new(FileNeighborSource::new(path)),
        None => Arc::new(CommandNeighborSource::new(
            &config.neighbor_command,
            &config.neighbor_args,
        )),
    };
    let prober = LivenessProber::new(
        Arc::new(PingProbe::new(&config.ping_path)),
        config.max_concurrent_probes,
    );

    let mut orchestrator =
        DiscoveryOrchestrator::new(settings, neighbors, prober, store.clone(), store)
            .with_sink(Arc::new(LogSink));
    if let Some(path) = &config.events_path {
        orchestrator = orchestrator.with_sink(Arc::new(JsonLinesSink::new(path)));
    }

    if cli.once {
        let report = orchestrator.run_cycle().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if cli.daemon {
        let sched = ScanScheduler::new(Arc::new(orchestrator), config.interval());
        sched.run().await?;
    } else {
        anyhow::bail!("Specify --once (single cycle) or --daemon (scheduled cycles)");
    }

    Ok(())
}
