//! Configuration loading from disk and the environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Full listen address, e.g. `":5000"` or `"127.0.0.1:8080"`.
pub const LISTEN_ADDR_VAR: &str = "TINYBABY_LISTEN_ADDR";

/// Bare port, consulted only when [`LISTEN_ADDR_VAR`] is unset.
pub const PORT_VAR: &str = "TINYBABY_PORT";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{var}={value:?} is not a valid port number")]
    InvalidPort { var: &'static str, value: String },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from a TOML file without validating it.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Override the listen address from `lookup`.
///
/// A set [`LISTEN_ADDR_VAR`] wins, even when empty (validation rejects that
/// later). Otherwise a set [`PORT_VAR`] produces `0.0.0.0:<port>`.
pub fn apply_env<F>(config: &mut ServerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(address) = lookup(LISTEN_ADDR_VAR) {
        config.listener.bind_address = address;
    } else if let Some(value) = lookup(PORT_VAR) {
        let port: u16 = value.trim().parse().map_err(|_| ConfigError::InvalidPort {
            var: PORT_VAR,
            value: value.clone(),
        })?;
        config.listener.bind_address = format!("0.0.0.0:{port}");
    }
    Ok(())
}

/// Build the effective configuration.
///
/// Precedence, lowest first: defaults, the TOML file at `path`, the
/// environment as seen through `lookup`, then `listen_addr` from the CLI.
pub fn resolve<F>(
    path: Option<&Path>,
    listen_addr: Option<String>,
    lookup: F,
) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    apply_env(&mut config, lookup)?;

    if let Some(address) = listen_addr {
        config.listener.bind_address = address;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// [`resolve`] against the process environment.
pub fn from_env(path: Option<&Path>, listen_addr: Option<String>) -> Result<ServerConfig, ConfigError> {
    resolve(path, listen_addr, |name| std::env::var(name).ok())
}
