//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Track connection state (Active → Draining → Closed)
//! - Tell every live connection when shutdown begins
//! - Let the coordinator wait until the last connection is gone
//! - Record per-connection traffic for the read and idle timeouts
//!
//! # Design Decisions
//! - A single `watch` channel carries the drain signal; each connection
//!   holds a receiver, so "all receivers dropped" means "all connections closed"
//! - The accept loop holds a receiver too, so draining cannot finish while it
//!   could still hand out new connections

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::{watch, Notify};
use tokio::time::{Duration, Instant};

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is active and processing requests.
    Active,
    /// Connection is draining (keep-alive off, finishing in-flight).
    Draining,
    /// Connection is done; its task stops serving it.
    Closed,
}

/// Create a drain handle and the tracker it controls.
pub fn connection_tracker() -> (DrainHandle, ConnectionTracker) {
    let (tx, rx) = watch::channel(false);
    (DrainHandle { tx }, ConnectionTracker { draining: rx })
}

/// Coordinator side of the drain signal.
#[derive(Debug)]
pub struct DrainHandle {
    tx: watch::Sender<bool>,
}

impl DrainHandle {
    /// Signal every tracked connection to drain.
    ///
    /// Returns `true` only for the call that actually started draining.
    pub fn drain(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_draining(&self) -> bool {
        *self.tx.borrow()
    }

    /// Number of outstanding receivers: live connections plus the accept loop
    /// while it is running.
    pub fn outstanding(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Completes once the accept loop and every connection have finished.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Accept-loop side: hands out a guard per accepted connection.
#[derive(Debug)]
pub struct ConnectionTracker {
    draining: watch::Receiver<bool>,
}

impl ConnectionTracker {
    /// Start tracking a new connection.
    pub fn track(&self) -> ConnectionGuard {
        ConnectionGuard {
            state: ConnectionState::Active,
            draining: self.draining.clone(),
        }
    }

    /// Completes once draining has been requested.
    pub async fn draining(&mut self) {
        let _ = self.draining.wait_for(|draining| *draining).await;
    }
}

/// Held by a connection task for the connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    state: ConnectionState,
    draining: watch::Receiver<bool>,
}

impl ConnectionGuard {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn set_state(&mut self, state: ConnectionState) {
        tracing::trace!(from = ?self.state, to = ?state, "Connection state changed");
        self.state = state;
    }

    /// Completes once draining has been requested, including a request made
    /// before this connection was accepted. A dropped drain handle counts too.
    pub async fn draining(&mut self) {
        let _ = self.draining.wait_for(|draining| *draining).await;
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        tracing::trace!(state = ?self.state, "Connection released");
    }
}

/// The next deadline a connection runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Between requests: the idle timeout, counted from the last byte moved.
    Idle(Instant),
    /// Part of a request head has arrived: the read timeout, counted from
    /// its first byte.
    Head(Instant),
}

impl Expiry {
    pub fn deadline(&self) -> Instant {
        match *self {
            Expiry::Idle(at) | Expiry::Head(at) => at,
        }
    }
}

#[derive(Debug)]
struct ActivityState {
    origin: Instant,
    last_millis: AtomicU64,
    /// Millis since `origin` plus one; zero while no head is pending.
    head_started: AtomicU64,
    in_request: AtomicBool,
    head_arrival: Notify,
}

/// Byte traffic on one connection, as needed for the read and idle timeouts.
///
/// A read outside a request starts a request head. Dispatching the request
/// ends the head, and the first response write ends the request.
#[derive(Debug, Clone)]
pub struct Activity {
    state: Arc<ActivityState>,
}

impl Activity {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ActivityState {
                origin: Instant::now(),
                last_millis: AtomicU64::new(0),
                head_started: AtomicU64::new(0),
                in_request: AtomicBool::new(false),
                head_arrival: Notify::new(),
            }),
        }
    }

    fn now_millis(&self) -> u64 {
        self.state.origin.elapsed().as_millis() as u64
    }

    fn at(&self, millis: u64) -> Instant {
        self.state.origin + Duration::from_millis(millis)
    }

    fn record_read(&self) {
        let now = self.now_millis();
        self.state.last_millis.store(now, Ordering::Relaxed);
        if self.state.in_request.load(Ordering::Acquire) {
            return;
        }
        let started = self
            .state
            .head_started
            .compare_exchange(0, now + 1, Ordering::AcqRel, Ordering::Acquire);
        if started.is_ok() {
            self.state.head_arrival.notify_one();
        }
    }

    fn record_write(&self) {
        self.state.last_millis.store(self.now_millis(), Ordering::Relaxed);
        self.state.in_request.store(false, Ordering::Release);
    }

    /// The request head has been parsed and handed to the service.
    pub fn request_started(&self) {
        self.state.in_request.store(true, Ordering::Release);
        self.state.head_started.store(0, Ordering::Release);
    }

    /// Last time bytes moved in either direction.
    pub fn last(&self) -> Instant {
        self.at(self.state.last_millis.load(Ordering::Relaxed))
    }

    /// When the pending request head started arriving, if one is pending.
    pub fn head_started(&self) -> Option<Instant> {
        match self.state.head_started.load(Ordering::Acquire) {
            0 => None,
            plus_one => Some(self.at(plus_one - 1)),
        }
    }

    pub fn in_request(&self) -> bool {
        self.state.in_request.load(Ordering::Acquire)
    }

    /// The deadline that currently applies, or `None` while a request is
    /// being handled (the write timeout bounds that).
    pub fn expiry(&self, read_timeout: Duration, idle_timeout: Duration) -> Option<Expiry> {
        if self.in_request() {
            return None;
        }
        Some(match self.head_started() {
            Some(started) => Expiry::Head(started + read_timeout),
            None => Expiry::Idle(self.last() + idle_timeout),
        })
    }

    /// Completes when the first byte of a new request head arrives.
    pub async fn head_arrival(&self) {
        self.state.head_arrival.notified().await
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::new()
    }
}

/// IO wrapper that reports every successful read or write to an [`Activity`].
#[derive(Debug)]
pub struct IdleIo<T> {
    inner: T,
    activity: Activity,
}

impl<T> IdleIo<T> {
    pub fn new(inner: T, activity: Activity) -> Self {
        Self { inner, activity }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for IdleIo<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            this.activity.record_read();
        }
        poll
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for IdleIo<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = poll {
            if n > 0 {
                this.activity.record_write();
            }
        }
        poll
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write_vectored(cx, bufs);
        if let Poll::Ready(Ok(n)) = poll {
            if n > 0 {
                this.activity.record_write();
            }
        }
        poll
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
