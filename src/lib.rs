//! Icecast integration gateway.
//!
//! Sits in the connection path between Icecast and its clients:
//! - counts listeners from Icecast's join/leave webhooks, tolerating
//!   out-of-order delivery
//! - accepts legacy `SOURCE ... ICE/1.0` source clients on the same port
//!   as regular HTTP/1.1

pub mod config;
pub mod http;
pub mod jobs;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod storage;
pub mod tracker;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use tracker::{ClientId, Recorder};
