//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → TINYBABY_LISTEN_ADDR / TINYBABY_PORT (loader.rs)
//!     → --listen-addr
//!     → validation.rs (semantic checks)
//!     → ServerConfig, handed to Server::bind
//! ```
//!
//! # Design Decisions
//! - Config is an explicit value passed to the server, never process-wide state
//! - All fields have defaults to allow an absent or minimal file
//! - Environment access goes through a lookup closure so tests stay hermetic

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{from_env, ConfigError};
pub use schema::{ListenerConfig, LogFormat, LoggingConfig, ServerConfig, TimeoutConfig};
