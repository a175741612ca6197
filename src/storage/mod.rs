//! Listen log storage.
//!
//! # Data Flow
//! ```text
//! startup: StorageRegistry (name → constructor)
//!     → open(config.listen_log.storage)
//!     → Arc<dyn ListenLogStorage>
//!     → listen log job appends one entry per tick
//! ```
//!
//! Providers are registered on an explicit registry built by the
//! composition root, never through global state.

pub mod memory;
pub mod registry;

use std::time::SystemTime;

use async_trait::async_trait;

pub use memory::MemoryListenLog;
pub use registry::{RegistryError, StorageRegistry};

/// One recorded listener count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenLogEntry {
    pub recorded_at: SystemTime,
    pub listeners: i64,
}

impl ListenLogEntry {
    pub fn now(listeners: i64) -> Self {
        Self {
            recorded_at: SystemTime::now(),
            listeners,
        }
    }
}

/// Error type for storage providers.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("invalid storage configuration: {0}")]
    Config(String),
}

/// Append-only history of listener counts.
#[async_trait]
pub trait ListenLogStorage: Send + Sync {
    async fn append(&self, entry: ListenLogEntry) -> Result<(), StorageError>;

    /// Stored entries, oldest first.
    async fn entries(&self) -> Result<Vec<ListenLogEntry>, StorageError>;
}
