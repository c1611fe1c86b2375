//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept)
//!     → connection.rs (lifecycle tracking, idle accounting)
//!     → Hand off to HTTP layer
//!
//! Connection States:
//!     Active → Draining → Closed
//! ```

pub mod connection;
pub mod listener;

pub use connection::{connection_tracker, ConnectionGuard, ConnectionState, ConnectionTracker, DrainHandle};
pub use listener::{Listener, ListenerError};
