//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the listener from the configured address
//! - Assemble the service stack
//! - Hand back a [`Server`] in the `Starting` phase
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, nothing is retried
//! - Interrupt handlers are registered by the caller before `run`

use axum::Router;
use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::http;
use crate::lifecycle::{Phase, Server};
use crate::net::{Listener, ListenerError};

/// Errors that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("could not listen on address: {0}")]
    Listen(#[from] ListenerError),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

impl Server {
    /// Bind the listener and build the health-check application.
    pub async fn bind(config: &ServerConfig) -> Result<Self, StartupError> {
        Self::bind_with(config, http::app(&config.timeouts)).await
    }

    /// Bind the listener and serve `app` instead of the health check.
    ///
    /// `app` is served as given; wrap it with
    /// [`with_middleware`](crate::http::server::with_middleware) for the
    /// request logger and write timeout.
    pub async fn bind_with(config: &ServerConfig, app: Router) -> Result<Self, StartupError> {
        tracing::info!("Server is starting");

        let listener = Listener::bind(&config.listener).await?;
        let (phase, _) = watch::channel(Phase::Starting);

        Ok(Self {
            listener,
            app,
            timeouts: config.timeouts,
            phase,
        })
    }
}
