//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → net::compat (ICE/1.0 → HTTP/1.1)
//!     → server.rs (Axum setup, middleware)
//!     → tracker::webhook (listener_joined / listener_left)
//!     → status.rs (read-only counts)
//! ```

pub mod server;
pub mod status;

pub use server::HttpServer;
