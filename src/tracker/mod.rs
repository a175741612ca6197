//! Listener presence tracking.
//!
//! # Data Flow
//! ```text
//! Icecast POST /listener_joined | /listener_left
//!     → webhook.rs (parse client id, answer with or without admit header)
//!     → recorder.rs (update membership under one lock)
//!
//! Readers (status route, listen log job):
//!     → Recorder::listener_amount()
//! ```

pub mod recorder;
pub mod webhook;

pub use recorder::{ClientId, Recorder};
