//! tinybaby
//!
//! A single-endpoint HTTP health-check server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net::listener ──▶ http::server ──▶ RequestLogLayer ──▶ responder
//!                                           ▲
//!     SIGINT/SIGTERM ──▶ lifecycle::signals ┘ (drain, bounded by shutdown_secs)
//! ```
//!
//! Exits 0 after a graceful shutdown and 1 on configuration errors, bind
//! failures or a shutdown that exceeds its bound.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use tinybaby::config::{self, LogFormat};
use tinybaby::lifecycle::{shutdown_trigger, Interrupts, Server};
use tinybaby::observability::logging;

/// tinybaby: a minimal HTTP health-check server
#[derive(Parser, Debug)]
#[command(name = "tinybaby", version, about)]
struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides TINYBABY_LISTEN_ADDR), e.g. ":5000"
    #[arg(long)]
    listen_addr: Option<String>,

    /// Log level filter (e.g., "tinybaby=debug")
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let loaded = config::from_env(args.config.as_deref(), args.listen_addr.clone());

    // Logging comes up even when the config is bad, so the failure is reported.
    let logging_config = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    let filter = logging::resolve_filter(
        args.log_level,
        std::env::var("RUST_LOG").ok(),
        logging_config.filter.as_deref(),
    );
    logging::init(args.log_format.unwrap_or(logging_config.format), &filter);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        listen_addr = %config.listener.bind_address,
        read_timeout_secs = config.timeouts.read_secs,
        write_timeout_secs = config.timeouts.write_secs,
        idle_timeout_secs = config.timeouts.idle_secs,
        shutdown_timeout_secs = config.timeouts.shutdown_secs,
        "Configuration loaded"
    );

    // Subscribe before serving so an early interrupt is not lost.
    let interrupts = match Interrupts::register() {
        Ok(interrupts) => interrupts,
        Err(e) => {
            tracing::error!(error = %e, "Could not install interrupt handler");
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(
                listen_addr = %config.listener.bind_address,
                error = %e,
                "Could not listen on address"
            );
            return ExitCode::FAILURE;
        }
    };

    match server.run(shutdown_trigger(interrupts)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Could not gracefully shutdown the server");
            ExitCode::FAILURE
        }
    }
}
