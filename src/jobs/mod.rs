//! Background jobs that read the tracker.

pub mod listen_log;

pub use listen_log::ListenLogJob;
