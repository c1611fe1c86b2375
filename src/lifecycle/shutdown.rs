//! Bounded shutdown.

use std::time::Duration;

use crate::net::DrainHandle;

/// Errors that make a shutdown non-graceful.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("connections still open after {0:?}")]
    Timeout(Duration),

    #[error("shutdown task ended without reporting completion")]
    Aborted,
}

/// Stop accepting, drain every connection, and wait at most `grace` for the
/// last one to close.
pub async fn drain(handle: &DrainHandle, grace: Duration) -> Result<(), ShutdownError> {
    if handle.drain() {
        tracing::debug!(
            outstanding = handle.outstanding(),
            grace_secs = grace.as_secs(),
            "Draining connections"
        );
    } else {
        tracing::debug!(outstanding = handle.outstanding(), "Drain already in progress");
    }

    tokio::time::timeout(grace, handle.closed())
        .await
        .map_err(|_| ShutdownError::Timeout(grace))
}
