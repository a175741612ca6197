//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the webhook and status handlers
//! - Wire up middleware (tracing, request ID, timeout)
//! - Put the `ICE/1.0` compatibility layer in front of the listener
//! - Run the pending-removal sweeper alongside the server

use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{Method, StatusCode, Uri},
    routing::get,
    serve::Listener,
    Router,
};
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::status::get_status;
use crate::lifecycle::shutdown::wait as shutdown_requested;
use crate::net::CompatListener;
use crate::tracker::{webhook, Recorder};

/// HTTP server for the Icecast webhooks.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    recorder: Arc<Recorder>,
}

impl HttpServer {
    pub fn new(config: GatewayConfig, recorder: Arc<Recorder>) -> Self {
        let router = Self::build_router(&config, Arc::clone(&recorder));
        Self {
            router,
            config,
            recorder,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, recorder: Arc<Recorder>) -> Router {
        webhook::routes()
            .route("/status", get(get_status))
            .fallback(not_found)
            .with_state(recorder)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The assembled router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve connections from `listener` until `shutdown` fires.
    ///
    /// Every accepted stream passes through the compatibility layer before
    /// hyper sees it.
    pub async fn run<L>(self, listener: L, shutdown: broadcast::Receiver<()>) -> io::Result<()>
    where
        L: Listener,
        L::Addr: Debug,
    {
        let listener = CompatListener::new(listener, self.config.compat.clone());
        let addr = listener.local_addr()?;
        tracing::info!(
            address = ?addr,
            legacy_source_support = self.config.compat.enabled,
            "HTTP server starting"
        );

        let sweeper = tokio::spawn(sweep_pending(
            Arc::clone(&self.recorder),
            self.config.tracker.sweep_interval(),
            shutdown.resubscribe(),
        ));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_requested(shutdown))
            .await?;

        sweeper.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn not_found(method: Method, uri: Uri) -> StatusCode {
    tracing::debug!(method = %method, path = %uri.path(), "No route matched");
    StatusCode::NOT_FOUND
}

/// Periodically forget early leaves whose join never came.
async fn sweep_pending(
    recorder: Arc<Recorder>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                recorder.evict_expired();
            }
            _ = shutdown.recv() => break,
        }
    }
}
