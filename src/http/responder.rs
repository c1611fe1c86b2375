//! The single health-check route.
//!
//! `/` answers `200 OK`; every other path answers `404 Not Found`. Both
//! responses are plain text and carry `X-Content-Type-Options: nosniff`.
//! The method is never inspected.

use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

/// Body of a successful health check.
pub const OK_BODY: &str = "OK";

/// Body of a not-found response.
pub const NOT_FOUND_BODY: &str = "Not Found\n";

/// Content type of both responses.
pub const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Handler used as the router's fallback, so it sees every request.
pub async fn index(uri: Uri) -> Response {
    respond(uri.path())
}

/// Map a request path to its response.
pub fn respond(path: &str) -> Response {
    if path != "/" {
        return plain_text(StatusCode::NOT_FOUND, NOT_FOUND_BODY);
    }
    plain_text(StatusCode::OK, OK_BODY)
}

fn plain_text(status: StatusCode, body: &'static str) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, PLAIN_TEXT),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        body,
    )
        .into_response()
}
