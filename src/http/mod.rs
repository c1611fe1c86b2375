//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, read/idle timeouts, drain handling)
//!     → logging.rs (RequestLogLayer, one record per request)
//!     → write timeout (tower-http)
//!     → responder.rs (200 for "/", 404 otherwise)
//! ```

pub mod logging;
pub mod responder;
pub mod server;

pub use logging::{RequestLog, RequestLogLayer};
pub use server::app;
