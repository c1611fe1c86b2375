//! HTTP server setup and connection handling.
//!
//! # Responsibilities
//! - Build the service stack (request logger → write timeout → responder)
//! - Run the accept loop until draining is requested
//! - Serve each connection over HTTP/1.1 with keep-alive
//! - Apply the read timeout and the idle timeout per connection
//! - Turn a drain request into hyper's graceful shutdown on every connection

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::Request;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tower::ServiceExt;
use tower_http::timeout::TimeoutLayer;

use crate::config::TimeoutConfig;
use crate::http::logging::RequestLogLayer;
use crate::http::responder;
use crate::net::connection::{
    Activity, ConnectionGuard, ConnectionState, ConnectionTracker, Expiry, IdleIo,
};
use crate::net::Listener;

/// Pause after a failed `accept` so a persistent error (e.g. fd exhaustion)
/// does not spin the loop.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(50);

/// The health-check application with all middleware layers.
pub fn app(timeouts: &TimeoutConfig) -> Router {
    with_middleware(Router::new().fallback(responder::index), timeouts)
}

/// Wrap `router` in the write timeout and the request logger.
#[allow(deprecated)]
pub fn with_middleware(router: Router, timeouts: &TimeoutConfig) -> Router {
    router
        .layer(TimeoutLayer::new(timeouts.write()))
        .layer(RequestLogLayer)
}

/// Accept connections until `tracker` reports draining.
///
/// The listener is dropped, and so closed, when this returns. Connection
/// tasks keep running until they finish draining.
pub async fn serve(listener: Listener, app: Router, timeouts: TimeoutConfig, mut tracker: ConnectionTracker) {
    loop {
        let (stream, remote) = tokio::select! {
            biased;
            _ = tracker.draining() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                    continue;
                }
            },
        };

        let guard = tracker.track();
        tokio::spawn(serve_connection(stream, remote, app.clone(), timeouts, guard));
    }

    tracing::debug!(address = %listener.local_addr(), "Stopped accepting connections");
}

/// Serve one connection until the peer closes it, it times out, or it has
/// drained after shutdown began.
///
/// Hyper's own header timer also runs while a keep-alive connection waits
/// for its next request, so it is switched off. The read timeout is counted
/// here from the first byte of each request head, and the idle timeout from
/// the last byte of traffic between requests.
pub async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    app: Router,
    timeouts: TimeoutConfig,
    mut guard: ConnectionGuard,
) {
    let activity = Activity::new();
    let io = TokioIo::new(IdleIo::new(stream, activity.clone()));

    let dispatched = activity.clone();
    let app = ServiceExt::<Request<Incoming>>::map_request(app, move |mut request: Request<Incoming>| {
        dispatched.request_started();
        request.extensions_mut().insert(ConnectInfo(remote));
        request
    });
    let service = TowerToHyperService::new(app);

    let mut builder = http1::Builder::new();
    builder.header_read_timeout(None::<Duration>).keep_alive(true);

    let connection = builder.serve_connection(io, service);
    tokio::pin!(connection);

    let read_timeout = timeouts.read();
    let idle_timeout = timeouts.idle();
    let timer = tokio::time::sleep_until(activity.last() + idle_timeout);
    tokio::pin!(timer);

    while guard.state() != ConnectionState::Closed {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(peer_addr = %remote, error = %e, "Connection ended with error");
                }
                guard.set_state(ConnectionState::Closed);
            }
            _ = guard.draining(), if guard.state() == ConnectionState::Active => {
                // Disables keep-alive: an idle connection closes now, a busy
                // one after its in-flight response is written.
                connection.as_mut().graceful_shutdown();
                guard.set_state(ConnectionState::Draining);
            }
            _ = activity.head_arrival() => {
                if let Some(expiry) = activity.expiry(read_timeout, idle_timeout) {
                    timer.as_mut().reset(expiry.deadline());
                }
            }
            _ = timer.as_mut() => {
                let now = Instant::now();
                match activity.expiry(read_timeout, idle_timeout) {
                    Some(Expiry::Head(deadline)) if deadline <= now => {
                        tracing::debug!(peer_addr = %remote, "Request head not received in time");
                        guard.set_state(ConnectionState::Closed);
                    }
                    Some(Expiry::Idle(deadline)) if deadline <= now => {
                        tracing::debug!(peer_addr = %remote, "Closing idle connection");
                        guard.set_state(ConnectionState::Closed);
                    }
                    Some(expiry) => timer.as_mut().reset(expiry.deadline()),
                    // Handler running; re-check once it could have answered.
                    None => timer.as_mut().reset(now + idle_timeout),
                }
            }
        }
    }
}
