//! Configuration schema definitions.
//!
//! All sections derive Serde traits and carry defaults, so an empty TOML
//! file (or no file at all) yields a usable configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Listen address used when neither the config file nor the environment sets one.
pub const DEFAULT_LISTEN_ADDR: &str = ":5000";

/// Log filter used when neither the CLI, `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "tinybaby=info";

/// Root configuration for the server.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Read/write/idle/shutdown timeouts.
    pub timeouts: TimeoutConfig,

    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address. A leading `:` (e.g. `":5000"`) means all interfaces.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

impl ListenerConfig {
    /// The bind address in a form `TcpListener::bind` accepts.
    pub fn socket_address(&self) -> String {
        if self.bind_address.starts_with(':') {
            format!("0.0.0.0{}", self.bind_address)
        } else {
            self.bind_address.clone()
        }
    }
}

/// Timeout configuration, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to read a request's headers.
    pub read_secs: u64,

    /// Time allowed for the handler to produce a response.
    pub write_secs: u64,

    /// Keep-alive connections with no traffic for this long are closed.
    pub idle_secs: u64,

    /// Bound on draining in-flight requests once shutdown begins.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 5,
            write_secs: 10,
            idle_secs: 15,
            shutdown_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable text.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,

    /// `EnvFilter` directives, e.g. `"tinybaby=debug"`.
    pub filter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.listener.bind_address, ":5000");
        assert_eq!(config.timeouts.read(), Duration::from_secs(5));
        assert_eq!(config.timeouts.write(), Duration::from_secs(10));
        assert_eq!(config.timeouts.idle(), Duration::from_secs(15));
        assert_eq!(config.timeouts.shutdown(), Duration::from_secs(30));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn port_only_address_binds_all_interfaces() {
        let listener = ListenerConfig {
            bind_address: ":8080".into(),
        };
        assert_eq!(listener.socket_address(), "0.0.0.0:8080");

        let listener = ListenerConfig {
            bind_address: "127.0.0.1:8080".into(),
        };
        assert_eq!(listener.socket_address(), "127.0.0.1:8080");
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [timeouts]
            shutdown_secs = 5

            [logging]
            format = "pretty"
            "#,
        )
        .unwrap();

        assert_eq!(config.timeouts.shutdown_secs, 5);
        assert_eq!(config.timeouts.read_secs, 5);
        assert_eq!(config.listener.bind_address, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }
}
