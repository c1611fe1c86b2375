//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Resolve the effective log filter
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format by default, pretty format for development
//! - Records go to stderr so stdout stays free for tooling

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, DEFAULT_LOG_FILTER};

/// Pick the log filter: CLI flag, then `RUST_LOG`, then config, then the default.
pub fn resolve_filter(
    cli: Option<String>,
    env: Option<String>,
    configured: Option<&str>,
) -> String {
    cli.or(env)
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init(format: LogFormat, filter: &str) {
    let registry = tracing_subscriber::registry().with(EnvFilter::new(filter));

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
