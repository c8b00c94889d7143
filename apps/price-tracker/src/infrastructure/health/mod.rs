//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, feed status, the current quote table
//! and Prometheus metrics.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (OK only while the feed is live)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /quotes` - Current snapshot as JSON, sorted by symbol

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::domain::connection::{ConnectionMonitor, ConnectionState, ConnectionStats};
use crate::domain::quote::{ChangeSign, PriceDirection, QuoteRecord};
use crate::domain::snapshot::SnapshotStore;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Tracker version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Feed connection status.
    pub feed: ConnectionStats,
    /// Snapshot status.
    pub snapshot: SnapshotStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Feed is live.
    Healthy,
    /// A session is being established.
    Degraded,
    /// Feed is down.
    Unhealthy,
}

impl From<ConnectionState> for HealthStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Live => Self::Healthy,
            ConnectionState::Connecting => Self::Degraded,
            ConnectionState::Disconnected => Self::Unhealthy,
        }
    }
}

/// Snapshot statistics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SnapshotStatus {
    /// Number of merged batches.
    pub version: u64,
    /// Number of symbols held.
    pub symbols: usize,
}

/// One row of the quote table.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteView {
    /// Instrument code.
    pub symbol: String,
    /// Current price.
    pub price: Decimal,
    /// 24h percent change.
    pub change_percent: Decimal,
    /// Price held before the last update.
    pub previous_price: Decimal,
    /// Direction of the last move.
    pub direction: PriceDirection,
    /// Sign of the 24h change.
    pub change_sign: ChangeSign,
    /// Local time of the last update.
    pub observed_at: DateTime<Local>,
}

impl From<&QuoteRecord> for QuoteView {
    fn from(record: &QuoteRecord) -> Self {
        Self {
            symbol: record.symbol().to_string(),
            price: record.price(),
            change_percent: record.change_percent(),
            previous_price: record.previous_price(),
            direction: record.direction(),
            change_sign: record.change_sign(),
            observed_at: record.observed_at(),
        }
    }
}

/// Quote table response.
#[derive(Debug, Clone, Serialize)]
pub struct QuotesResponse {
    /// Snapshot version the rows were read from.
    pub version: u64,
    /// Feed state when the rows were read.
    pub connection: ConnectionState,
    /// Rows sorted by symbol.
    pub quotes: Vec<QuoteView>,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
#[derive(Debug)]
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    connection: Arc<ConnectionMonitor>,
    store: Arc<SnapshotStore>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(
        version: String,
        connection: Arc<ConnectionMonitor>,
        store: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            connection,
            store,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Build the HTTP router.
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/quotes", get(quotes_handler))
        .with_state(state)
}

/// Health check HTTP server.
#[derive(Debug)]
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.connection.state().is_live() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

async fn quotes_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    Json(build_quotes_response(&state))
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let feed = state.connection.stats();
    let snapshot = state.store.snapshot();

    HealthResponse {
        status: HealthStatus::from(feed.state),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed,
        snapshot: SnapshotStatus {
            version: snapshot.version(),
            symbols: snapshot.len(),
        },
    }
}

fn build_quotes_response(state: &HealthServerState) -> QuotesResponse {
    let snapshot = state.store.snapshot();
    let mut quotes: Vec<QuoteView> = snapshot.records().map(QuoteView::from).collect();
    quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    QuotesResponse {
        version: snapshot.version(),
        connection: state.connection.state(),
        quotes,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
