//! tinybaby: a minimal HTTP health-check server with graceful shutdown.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ServerConfig;
pub use lifecycle::{Phase, Server};
