//! Health Check Server - Liveness, Readiness and Metrics Scrape
//!
//! Exposes /live, /ready and /metrics via axum 0.7. Readiness depends
//! on the Discord gateway session and chain RPC health.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::domain::error::with_timeout;
use crate::ports::chain_client::ChainReader;

use super::prometheus::MetricsRegistry;

/// Shared health state polled by readiness probes.
#[derive(Debug, Clone)]
pub struct HealthState {
    /// Whether the Discord gateway session is identified.
    pub gateway_connected: Arc<AtomicBool>,
    /// Whether the last chain RPC round-trip succeeded.
    pub chain_healthy: Arc<AtomicBool>,
}

impl HealthState {
    /// Gateway starts disconnected; chain starts healthy after startup checks.
    pub fn new() -> Self {
        Self {
            gateway_connected: Arc::new(AtomicBool::new(false)),
            chain_healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.gateway_connected.load(Ordering::Relaxed) && self.chain_healthy.load(Ordering::Relaxed)
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Ask the node for its health within `budget` and record the result.
///
/// A node that does not answer in time counts as unhealthy.
pub async fn refresh_chain_health<C: ChainReader>(chain: &C, state: &HealthState, budget: Duration) -> bool {
    let check = async { Ok(chain.is_healthy().await) };
    let healthy = with_timeout("chain health check", budget, check).await.unwrap_or(false);
    if !healthy {
        warn!("Chain RPC health check failed");
    }
    state.chain_healthy.store(healthy, Ordering::Relaxed);
    healthy
}

#[derive(Clone)]
struct AppState {
    health: Arc<HealthState>,
    metrics: Arc<MetricsRegistry>,
}

/// Axum-based health and metrics HTTP server.
pub struct HealthServer {
    state: Arc<HealthState>,
    metrics: Arc<MetricsRegistry>,
    /// Bind port (default 8080 from config).
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<HealthState>, metrics: Arc<MetricsRegistry>, port: u16) -> Self {
        Self { state, metrics, port }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/metrics", get(Self::scrape))
            .with_state(AppState {
                health: Arc::clone(&self.state),
                metrics: Arc::clone(&self.metrics),
            })
    }

    /// Serve until the shutdown broadcast fires.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = self.router();

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
        if state.health.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    async fn scrape(State(state): State<AppState>) -> impl IntoResponse {
        let connected = state.health.gateway_connected.load(Ordering::Relaxed);
        state.metrics.gateway_connected.set(i64::from(connected));
        match state.metrics.encode() {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}
