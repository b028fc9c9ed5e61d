//! obdd - OBD-II Telemetry Daemon
//!
//! Connects to an ELM327 adapter (or the simulator), keeps the link alive and
//! periodically reports every channel plus the driver-assist hints.
//!
//! # Usage
//!
//! ```bash
//! # Real adapter on the default WiFi address
//! obdd
//!
//! # Local simulator, JSON lines on stdout
//! OBD_HOST=127.0.0.1 obdd --json
//!
//! # Config file
//! obdd --config config/obdd.toml --verbose
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use obd_core::assist::ThrottleStyle;
use obd_core::{evaluate, AssistReport, ChannelId, ChannelReading, LinkState, ThrottleCoach, ValueStore};
use obd_link::{LinkConfig, Poller, Supervisor, SupervisorConfig, SupervisorHandle, TcpConnector};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "obdd")]
#[command(about = "OBD-II telemetry daemon for ELM327 adapters")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Adapter host, overrides config and OBD_HOST
    #[arg(long)]
    host: Option<String>,

    /// Adapter port, overrides config and OBD_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Report interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    report_ms: u64,

    /// Print reports as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// One periodic report
#[derive(Debug, Serialize)]
struct Report {
    at: DateTime<Utc>,
    link: LinkState,
    channels: Vec<ChannelReading>,
    assist: AssistReport,
    throttle_style: Option<ThrottleStyle>,
}

fn load_config(args: &Args) -> Result<LinkConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path);
            LinkConfig::load(path).with_context(|| format!("Failed to load config {}", path))?
        }
        None => LinkConfig::default(),
    };
    config.apply_env().context("Invalid environment override")?;

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "obdd=debug,obd_link=debug,obd_core=debug"
    } else {
        "obdd=info,obd_link=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting obdd (OBD-II Telemetry Daemon)");

    let config = load_config(&args)?;
    let plans = config.build_plans().context("Invalid channel selection")?;

    let store = Arc::new(ValueStore::new());
    let poller = Arc::new(Poller::new(plans, store.clone(), &config.timing));
    let connector = Arc::new(TcpConnector::from_config(&config));
    let handle = Supervisor::new(connector, poller, SupervisorConfig::from(&config)).spawn();

    info!(endpoint = %config.endpoint(), report_ms = args.report_ms, "Supervisor started");

    let log_states = tokio::spawn(log_state_changes(handle.subscribe()));
    let reports = tokio::spawn(report_loop(
        store,
        handle,
        Duration::from_millis(args.report_ms.max(1)),
        args.json,
    ));

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    info!("Shutting down");
    reports.abort();
    log_states.abort();
    Ok(())
}

async fn log_state_changes(mut rx: tokio::sync::watch::Receiver<LinkState>) {
    while rx.changed().await.is_ok() {
        let state = *rx.borrow_and_update();
        if state == LinkState::Faulted {
            warn!(%state, "Adapter link lost");
        } else {
            info!(%state, "Adapter link");
        }
    }
}

/// Owns the supervisor handle, so aborting this task stops polling too
async fn report_loop(store: Arc<ValueStore>, handle: SupervisorHandle, every: Duration, json: bool) {
    let mut coach = ThrottleCoach::new();
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        let throttle = store.reading(ChannelId::Throttle);
        let throttle_style = match (throttle.current(), throttle.updated_at) {
            (Some(value), Some(at)) => coach.observe(value, at),
            _ => None,
        };
        let report = Report {
            at: Utc::now(),
            link: handle.state(),
            channels: store.snapshot(),
            assist: evaluate(&store),
            throttle_style,
        };

        if json {
            match serde_json::to_string(&report) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "Failed to serialize report"),
            }
        } else {
            log_report(&report);
        }
    }
}

fn log_report(report: &Report) {
    if !report.link.is_polling() {
        info!(link = %report.link, "Waiting for adapter");
        return;
    }
    let channels = report
        .channels
        .iter()
        .filter(|r| r.has_data())
        .map(|r| format!("{}={}", r.channel, r.display_value()))
        .collect::<Vec<_>>()
        .join(" ");
    info!(%channels, "Live");
    info!(assist = %report.assist, throttle = ?report.throttle_style, "Assist");
}
