//! OS signal handling.
//!
//! # Responsibilities
//! - Register interrupt handlers before the server starts serving
//! - Turn the first interrupt into the shutdown trigger
//! - Swallow later interrupts while shutdown is in progress
//!
//! # Design Decisions
//! - Registration is synchronous, so an interrupt that arrives between
//!   startup and the first poll is still delivered
//! - SIGTERM is handled like SIGINT on unix; Ctrl+C elsewhere
//! - Tokio keeps the handlers installed for the life of the process, so a
//!   repeated interrupt never falls through to the default "terminate" action

use std::future::Future;

use tokio::sync::oneshot;

use crate::lifecycle::startup::StartupError;

/// Registered interrupt handlers.
#[derive(Debug)]
pub struct Interrupts {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(not(unix))]
    ctrl_c: tokio::signal::windows::CtrlC,
}

impl Interrupts {
    /// Install the handlers. Must be called from within a Tokio runtime.
    #[cfg(unix)]
    pub fn register() -> Result<Self, StartupError> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigint: signal(SignalKind::interrupt()).map_err(StartupError::Signal)?,
            sigterm: signal(SignalKind::terminate()).map_err(StartupError::Signal)?,
        })
    }

    /// Install the handler. Must be called from within a Tokio runtime.
    #[cfg(not(unix))]
    pub fn register() -> Result<Self, StartupError> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c().map_err(StartupError::Signal)?,
        })
    }

    /// Wait for the next interrupt and name it.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }

    /// Wait for the next interrupt and name it.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        self.ctrl_c.recv().await;
        "CTRL_C"
    }
}

/// Build the shutdown trigger for [`Server::run`](crate::lifecycle::Server::run).
///
/// A background task owns `interrupts`: the first interrupt resolves the
/// returned future, every later one is logged and otherwise ignored.
pub fn shutdown_trigger(mut interrupts: Interrupts) -> impl Future<Output = ()> + Send + 'static {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let signal = interrupts.recv().await;
        tracing::info!(signal, "Received interrupt");
        let _ = tx.send(());

        loop {
            let signal = interrupts.recv().await;
            tracing::warn!(signal, "Shutdown already in progress, ignoring interrupt");
        }
    });

    async move {
        let _ = rx.await;
    }
}
