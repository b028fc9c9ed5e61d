//! ELM327 Vehicle Simulator
//!
//! Listens like a WiFi ELM327 adapter and answers Mode 01 requests from a
//! simulated vehicle cycling through driving scenarios.
//!
//! # Usage
//!
//! ```bash
//! ./obd-sim --port 35000
//! ./obd-sim --config config/obd-sim.toml --verbose
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use obd_sim::SimConfig;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "obd-sim")]
#[command(about = "ELM327 vehicle simulator for OBD-II telemetry development")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long, env = "OBD_PORT")]
    port: Option<u16>,

    /// Physics tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Seconds spent in each driving scenario
    #[arg(long)]
    scenario_secs: Option<u64>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading config from: {}", path);
                SimConfig::load(path).with_context(|| format!("Failed to load config {}", path))?
            }
            None => SimConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        if let Some(secs) = self.scenario_secs {
            config.scenario_secs = secs;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "obd_sim=debug"
    } else {
        "obd_sim=info"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.into_config()?;
    let sim = obd_sim::start(&config).await?;

    info!(addr = %sim.addr(), "Simulator ready - waiting for clients");
    info!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    sim.shutdown();

    info!("Simulator stopped");
    Ok(())
}
