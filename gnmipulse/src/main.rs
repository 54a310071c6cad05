//! gnmipulse: a YANG gNMI telemetry exporter for Prometheus.
//!
//! Subscribes to streaming telemetry on gNMI-enabled network devices,
//! decodes notifications against OpenConfig data models and serves the
//! current state on a Prometheus scrape endpoint.

mod config;
mod core;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gnmipulse")]
#[command(about = "A YANG gNMI telemetry exporter for Prometheus")]
#[command(version)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            // Missing or malformed arguments count as bad configuration.
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    init_tracing(&args);
    info!(version = env!("CARGO_PKG_VERSION"), "starting gnmipulse");

    let resolved = match config::load(&args.config) {
        Ok(resolved) => resolved,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::from(1);
        }
    };

    match core::Core::new(resolved).run().await {
        Ok(()) => {
            info!("bye bye...");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "fatal error");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    if args.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
