#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Price Tracker - Live Quote Snapshot
//!
//! Ingests the Binance all-market ticker stream, keeps the instruments on a
//! fixed watch-list, and maintains one always-current snapshot of the
//! latest quote per instrument, together with the feed's connection state.
//!
//! # Layers (inside to outside)
//!
//! - **Domain**: Quote model, filtering, snapshot and connection state
//!   - `quote`: Quote records and their construction from ticker entries
//!   - `watchlist`: Instrument filter
//!   - `snapshot`: Latest-quote store with atomic batch merge
//!   - `connection`: Connecting / live / disconnected state machine
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: `FeedTransport`, `BatchDecoder` and `PipelineObserver`
//!   - `pipeline`: Transport events to snapshot merges and state changes
//!   - `reconnect`: Backoff between sessions
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: WebSocket transport and ticker codec
//!   - `config`: Environment configuration, pipeline configuration
//!   - `metrics`: Prometheus recorder and the pipeline observer
//!   - `health`: Health, readiness, metrics and quotes over HTTP
//!   - `telemetry`, `display`
//!
//! # Data Flow
//!
//! ```text
//! Binance !ticker@arr --> FeedTransport --> IngestionPipeline
//!                                              |        |
//!                                   watch-list filter   lifecycle events
//!                                              v        v
//!                                      SnapshotStore  ConnectionMonitor
//!                                              |        |
//!                                   watch::Receiver  watch::Receiver
//!                                              \        /
//!                                   display, /quotes, /health
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Quote model, filtering, snapshot and connection state.
pub mod domain;

/// Application layer - Ingestion pipeline and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::connection::{ConnectionMonitor, ConnectionState, ConnectionStats, LifecycleTrigger};
pub use domain::quote::{
    ChangeSign, EntryField, InvalidEntryError, InvalidReason, PriceDirection, QuoteRecord,
    TickerEntry,
};
pub use domain::snapshot::{Snapshot, SnapshotStore};
pub use domain::watchlist::WatchList;

// Application
pub use application::pipeline::{
    BatchSummary, IngestionPipeline, PipelineConfig, SessionControl, SessionEnd,
};
pub use application::ports::{
    BatchDecoder, FeedTransport, MalformedBatchError, NoopObserver, PipelineObserver,
    TransportError, TransportEvent,
};
pub use application::reconnect::{ReconnectConfig, ReconnectPolicy};

// Binance adapter
pub use infrastructure::binance::{TickerCodec, WebSocketTransport};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, ConnectionSettings, FeedSettings, ServerSettings, TrackerConfig,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::{PrometheusObserver, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
