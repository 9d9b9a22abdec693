//! LACP Daemon
//!
//! Main entry point for lacpd. Loads the group configuration, drives the
//! protocol engine and exports state until interrupted.

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use sonic_lacpd::{Daemon, LacpdConfig, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// SONiC Link Aggregation Control Protocol daemon
#[derive(Parser, Debug)]
#[command(name = "lacpd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log filter (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Write JSON state here instead of the configured file
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Cable every port to a simulated LACP partner
    #[arg(long)]
    simulate_partner: bool,

    /// Exit after this many ticks
    #[arg(long)]
    ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level, args.log_format) {
        eprintln!("lacpd: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let chain = format!("{:#}", e);
            error!(error = %chain, "lacpd exiting with error");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level {:?}", level))?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);
    let installed = match format {
        LogFormat::Text => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = LacpdConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(path) = args.state_file {
        config.daemon.state_file = Some(path);
    }
    if args.simulate_partner {
        config.partner.enabled = true;
    }
    config.validate().context("invalid configuration")?;
    if config.ports.is_empty() {
        warn!(group = %config.group.name, "no ports configured");
    }

    info!(
        group = %config.group.name,
        ports = config.ports.len(),
        policy = %config.group.lacp.selection_policy,
        rate = %config.group.lacp.lacp_rate,
        ticks_per_sec = config.group.lacp.ticks_per_sec,
        "starting lacpd"
    );
    let daemon = Daemon::build(&config).context("building LACP group")?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received shutdown signal");
                shutdown.cancel();
            }
            Err(e) => warn!(error = %e, "cannot listen for shutdown signal"),
        }
    });

    let summary = daemon.run(cancel, args.ticks).await;
    info!(
        ticks = summary.ticks,
        frames_forwarded = summary.routed.frames_forwarded,
        snapshots = summary.snapshots,
        carrier_up = summary.carrier_up,
        "lacpd stopped"
    );
    Ok(())
}
