//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle transitions, request logger
//!     → tracing events with structured fields
//!     → logging.rs subscriber (EnvFilter + fmt, JSON or pretty)
//!     → stderr
//! ```

pub mod logging;
