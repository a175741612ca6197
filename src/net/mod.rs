//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (lifecycle tracking)
//!     → compat.rs (ICE/1.0 request line rewrite)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Listeners compose as `axum::serve::Listener` decorators
//! - Protocol inspection runs per connection, never in the accept loop

pub mod compat;
pub mod connection;
pub mod listener;

pub use compat::{CompatListener, CompatStream};
pub use listener::{BoundedListener, ListenerError};
