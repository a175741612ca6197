//! Read-only status route for dashboards, the IRC bot and the CLI.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::tracker::Recorder;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub version: &'static str,
    pub listeners: i64,
    pub pending_removal: usize,
}

pub async fn get_status(State(recorder): State<Arc<Recorder>>) -> Json<StatusReport> {
    Json(StatusReport {
        version: env!("CARGO_PKG_VERSION"),
        listeners: recorder.listener_amount(),
        pending_removal: recorder.pending_amount(),
    })
}
