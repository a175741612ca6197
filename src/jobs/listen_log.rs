//! Periodic listen log.
//!
//! Reads the current listener count and appends it to storage on a fixed
//! interval. A failed append is logged and the job keeps running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::ListenLogConfig;
use crate::observability::metrics;
use crate::storage::{ListenLogEntry, ListenLogStorage, StorageError};
use crate::tracker::Recorder;

pub struct ListenLogJob {
    recorder: Arc<Recorder>,
    storage: Arc<dyn ListenLogStorage>,
    interval: Duration,
}

impl ListenLogJob {
    pub fn new(
        recorder: Arc<Recorder>,
        storage: Arc<dyn ListenLogStorage>,
        config: &ListenLogConfig,
    ) -> Self {
        Self {
            recorder,
            storage,
            interval: Duration::from_secs(config.interval_secs.max(1)),
        }
    }

    /// Record the current listener count once.
    pub async fn tick(&self) -> Result<ListenLogEntry, StorageError> {
        let entry = ListenLogEntry::now(self.recorder.listener_amount());
        self.storage.append(entry.clone()).await?;
        Ok(entry)
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Listen log job starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(entry) => {
                            metrics::record_listen_log("ok");
                            tracing::debug!(listeners = entry.listeners, "Listen log entry recorded");
                        }
                        Err(e) => {
                            metrics::record_listen_log("error");
                            tracing::warn!(error = %e, "Failed to record listen log entry");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Listen log job received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
