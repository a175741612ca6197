//! Storage provider registry.
//!
//! Built once at startup and passed by reference. Registering the same name
//! twice is an error returned to the caller.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::ListenLogConfig;

use super::{ListenLogStorage, MemoryListenLog, StorageError};

/// Constructor for a storage provider.
pub type OpenFn =
    Box<dyn Fn(&ListenLogConfig) -> Result<Arc<dyn ListenLogStorage>, StorageError> + Send + Sync>;

/// Error type for registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("storage provider {0:?} is already registered")]
    Duplicate(String),
    #[error("unknown storage provider {0:?}")]
    Unknown(String),
    #[error("failed to open storage provider {name:?}: {source}")]
    Open {
        name: String,
        #[source]
        source: StorageError,
    },
}

/// Name → constructor map for listen log storage.
#[derive(Default)]
pub struct StorageRegistry {
    providers: HashMap<String, OpenFn>,
}

impl StorageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the providers shipped with the gateway.
    pub fn with_builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register("memory", |config: &ListenLogConfig| {
            Ok(Arc::new(MemoryListenLog::new(config.memory_capacity)) as Arc<dyn ListenLogStorage>)
        })?;
        Ok(registry)
    }

    /// Register a provider under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, open: F) -> Result<(), RegistryError>
    where
        F: Fn(&ListenLogConfig) -> Result<Arc<dyn ListenLogStorage>, StorageError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        if self.providers.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.providers.insert(name, Box::new(open));
        Ok(())
    }

    /// Open the provider named in the configuration.
    pub fn open(&self, config: &ListenLogConfig) -> Result<Arc<dyn ListenLogStorage>, RegistryError> {
        let name = config.storage.as_str();
        let open = self
            .providers
            .get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
        let storage = open(config).map_err(|source| RegistryError::Open {
            name: name.to_string(),
            source,
        })?;
        tracing::info!(provider = name, "Listen log storage opened");
        Ok(storage)
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
