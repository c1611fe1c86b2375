//! Per-request access logging.
//!
//! [`RequestLogLayer`] wraps any service. Each request gets a
//! [`RequestRecord`] that emits one `"Handled request"` event when it is
//! dropped, i.e. once the wrapped service has finished, whether it returned
//! a response, an error, or was cancelled before completing.

use std::net::SocketAddr;
use std::task::{Context, Poll};

use axum::extract::ConnectInfo;
use axum::http::{header::USER_AGENT, Method, Request, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

/// Layer that applies [`RequestLog`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogLayer;

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLog<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLog { inner }
    }
}

/// Service that logs every request it forwards once handling completes.
#[derive(Debug, Clone)]
pub struct RequestLog<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestLog<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let record = RequestRecord::capture(&request);
        let future = self.inner.call(request);

        Box::pin(async move {
            let mut record = record;
            let result = future.await;
            if let Ok(response) = &result {
                record.status = Some(response.status().as_u16());
            }
            result
        })
    }
}

/// The fields logged for one request. Logged on drop.
#[derive(Debug)]
pub struct RequestRecord {
    method: Method,
    path: String,
    remote_addr: String,
    user_agent: String,
    status: Option<u16>,
}

impl RequestRecord {
    /// Snapshot the loggable parts of a request before it is handed on.
    ///
    /// The remote address comes from the `ConnectInfo` extension the
    /// connection task inserts; it is empty when absent, as is a missing or
    /// non-UTF-8 user agent.
    pub fn capture<B>(request: &Request<B>) -> Self {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        let user_agent = request
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Self {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            remote_addr,
            user_agent,
            status: None,
        }
    }
}

impl Drop for RequestRecord {
    fn drop(&mut self) {
        tracing::info!(
            method = %self.method,
            path = %self.path,
            remote_addr = %self.remote_addr,
            user_agent = %self.user_agent,
            status = self.status,
            "Handled request"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::http::responder;

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl Captured {
        fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
            tracing_subscriber::fmt()
                .json()
                .with_writer(self.clone())
                .finish()
        }

        fn handled_requests(&self) -> Vec<Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str::<Value>(line).unwrap())
                .filter(|event| event["fields"]["message"] == "Handled request")
                .map(|event| event["fields"].clone())
                .collect()
        }
    }

    fn request(path: &str, user_agent: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::POST).uri(path);
        if let Some(agent) = user_agent {
            builder = builder.header(USER_AGENT, agent);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 1, 2, 3], 40000))));
        request
    }

    #[test]
    fn capture_reads_request_fields() {
        let record = RequestRecord::capture(&request("/missing?x=1", Some("healthcheck/1.0")));
        assert_eq!(record.method, Method::POST);
        assert_eq!(record.path, "/missing");
        assert_eq!(record.remote_addr, "10.1.2.3:40000");
        assert_eq!(record.user_agent, "healthcheck/1.0");
        assert_eq!(record.status, None);
    }

    #[test]
    fn capture_tolerates_missing_fields() {
        let request = Request::builder().uri("/").body(()).unwrap();
        let record = RequestRecord::capture(&request);
        assert_eq!(record.remote_addr, "");
        assert_eq!(record.user_agent, "");
    }

    #[tokio::test]
    async fn one_record_per_request() {
        let captured = Captured::default();
        let _guard = tracing::subscriber::set_default(captured.subscriber());

        let app = Router::new()
            .fallback(responder::index)
            .layer(RequestLogLayer);

        let response = app
            .clone()
            .oneshot(request("/", Some("curl/8.0")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(request("/missing", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let records = captured.handled_requests();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0]["method"], "POST");
        assert_eq!(records[0]["path"], "/");
        assert_eq!(records[0]["remote_addr"], "10.1.2.3:40000");
        assert_eq!(records[0]["user_agent"], "curl/8.0");
        assert_eq!(records[0]["status"], 200);

        assert_eq!(records[1]["path"], "/missing");
        assert_eq!(records[1]["user_agent"], "");
        assert_eq!(records[1]["status"], 404);
    }

    #[tokio::test]
    async fn cancelled_request_is_still_logged() {
        let captured = Captured::default();
        let _guard = tracing::subscriber::set_default(captured.subscriber());

        let slow = tower::service_fn(|_request: Request<Body>| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, Infallible>(Response::new(Body::empty()))
        });
        let service = RequestLogLayer.layer(slow);

        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            service.oneshot(request("/slow", Some("impatient"))),
        )
        .await;
        assert!(outcome.is_err());

        let records = captured.handled_requests();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["path"], "/slow");
        assert!(records[0].get("status").is_none());
    }

    #[tokio::test]
    async fn failed_request_is_logged() {
        let captured = Captured::default();
        let _guard = tracing::subscriber::set_default(captured.subscriber());

        let failing = tower::service_fn(|_request: Request<Body>| async {
            Err::<Response<Body>, _>(std::io::Error::other("boom"))
        });
        let service = RequestLogLayer.layer(failing);

        assert!(service.oneshot(request("/", None)).await.is_err());
        assert_eq!(captured.handled_requests().len(), 1);
    }
}
