//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Bind listener → build service stack → Phase::Starting
//!
//! Serving (Server::run):
//!     accept task        ── serves connections until draining
//!     trigger task       ── waits for the shutdown trigger, then drains
//!     caller             ── waits on the one-shot "done" channel
//!
//! Shutdown (shutdown.rs):
//!     Trigger → stop accepting → keep-alive off → drain (bounded) → Stopped
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → shutdown trigger; repeats ignored
//! ```
//!
//! # Design Decisions
//! - Tasks talk only through one-shot and watch channels
//! - Shutdown has a bound: exceeding it is reported as an error, which the
//!   binary treats as fatal

pub mod shutdown;
pub mod signals;
pub mod startup;

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::sync::{oneshot, watch};

use crate::config::TimeoutConfig;
use crate::http;
use crate::net::{connection_tracker, Listener};

pub use shutdown::ShutdownError;
pub use signals::{shutdown_trigger, Interrupts};
pub use startup::StartupError;

/// Where the server is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Listener bound, not yet serving.
    Starting,
    /// Accepting and serving connections.
    Serving,
    /// Trigger received; draining in-flight requests.
    ShuttingDown,
    /// Every connection closed. Terminal.
    Stopped,
}

/// A bound server, ready to run.
#[derive(Debug)]
pub struct Server {
    listener: Listener,
    app: Router,
    timeouts: TimeoutConfig,
    phase: watch::Sender<Phase>,
}

impl Server {
    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Observe phase transitions.
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Serve until `trigger` completes, then shut down gracefully.
    ///
    /// Returns `Ok(())` once every connection has closed, or
    /// [`ShutdownError::Timeout`] if that takes longer than the configured
    /// shutdown bound. Connections still open at that point are abandoned
    /// to the runtime.
    pub async fn run<F>(self, trigger: F) -> Result<(), ShutdownError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Server {
            listener,
            app,
            timeouts,
            phase,
        } = self;

        let local_addr = listener.local_addr();
        let (drain, tracker) = connection_tracker();
        let (done_tx, done_rx) = oneshot::channel();

        let accept = tokio::spawn(http::server::serve(listener, app, timeouts, tracker));
        phase.send_replace(Phase::Serving);
        tracing::info!(addr = %local_addr, "Server is ready to handle requests");

        let shutdown_phase = phase.clone();
        let grace = timeouts.shutdown();
        tokio::spawn(async move {
            trigger.await;
            shutdown_phase.send_replace(Phase::ShuttingDown);
            tracing::info!("Server is shutting down");
            let _ = done_tx.send(shutdown::drain(&drain, grace).await);
        });

        done_rx.await.unwrap_or(Err(ShutdownError::Aborted))?;

        // The accept task held a drain receiver, so it has already returned.
        if let Err(e) = accept.await {
            tracing::warn!(error = %e, "Accept task ended abnormally");
        }

        phase.send_replace(Phase::Stopped);
        tracing::info!("Server stopped");
        Ok(())
    }
}
