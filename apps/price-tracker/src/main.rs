//! Price Tracker Binary
//!
//! Streams live quotes for the watch-list and serves them over HTTP.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin price-tracker
//! ```
//!
//! # Environment Variables
//!
//! All optional.
//! - `TRACKER_STREAM_URL`: Ticker stream URL (default: Binance `!ticker@arr`)
//! - `TRACKER_WATCHLIST`: Comma separated base codes (default: BTC,ETH,BNB,...)
//! - `TRACKER_QUOTE_SUFFIX`: Quote currency (default: USDT)
//! - `TRACKER_CONNECT_TIMEOUT_SECS`: Time allowed to go live (default: 10)
//! - `TRACKER_RECONNECT_ENABLED`: Reconnect after a disconnect (default: false)
//! - `TRACKER_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `TRACKER_DISPLAY_INTERVAL_SECS`: Log display period, 0 disables (default: 5)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: `price_tracker=info`)

use std::sync::Arc;
use std::time::Duration;

use price_tracker::infrastructure::health::{HealthServer, HealthServerState};
use price_tracker::infrastructure::{display, telemetry};
use price_tracker::{
    IngestionPipeline, PipelineConfig, PrometheusObserver, TickerCodec, TrackerConfig,
    WebSocketTransport, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Time allowed for the pipeline to tear down after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting price tracker");

    let _metrics_handle = init_metrics()?;

    let config = TrackerConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let pipeline = Arc::new(
        IngestionPipeline::new(
            config.watchlist(),
            TickerCodec::new(),
            PipelineConfig::from(&config),
        )
        .with_observer(PrometheusObserver),
    );

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(pipeline.connection()),
        Arc::clone(pipeline.store()),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    if !config.display_interval.is_zero() {
        tokio::spawn(display::run(
            config.watchlist(),
            pipeline.snapshots(),
            pipeline.connection_states(),
            config.display_interval,
            shutdown_token.child_token(),
        ));
    }

    let mut pipeline_task = {
        let pipeline = Arc::clone(&pipeline);
        let cancel = shutdown_token.clone();
        let mut transport = WebSocketTransport::new(config.feed.stream_url.clone());
        tokio::spawn(async move {
            pipeline.run(&mut transport, cancel).await;
        })
    };

    tracing::info!("Price tracker ready");

    let mut pipeline_done = false;
    tokio::select! {
        () = await_shutdown() => {}
        result = &mut pipeline_task => {
            pipeline_done = true;
            if let Err(e) = result {
                tracing::error!(error = %e, "Pipeline task failed");
            }
            tracing::info!(
                state = %pipeline.connection().state(),
                "Feed stopped; waiting for shutdown signal"
            );
            await_shutdown().await;
        }
    }

    shutdown_token.cancel();
    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );

    if !pipeline_done && tokio::time::timeout(SHUTDOWN_TIMEOUT, pipeline_task).await.is_err() {
        tracing::warn!("Pipeline did not stop within the shutdown timeout");
    }

    tracing::info!("Price tracker stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &TrackerConfig) {
    tracing::info!(
        watchlist = %config.feed.watchlist.join(","),
        quote_suffix = %config.feed.quote_suffix,
        reconnect = config.connection.reconnect_enabled,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(stream_url = %config.feed.stream_url, "Feed endpoint");
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
