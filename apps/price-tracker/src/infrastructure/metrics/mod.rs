//! Prometheus Metrics Module
//!
//! Exposes tracker metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Batches**: Frames received, frames rejected, processing latency
//! - **Entries**: Entries accepted into the snapshot and entries rejected
//! - **Connection**: Session attempts and current connection state
//! - **Snapshot**: Number of symbols held
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. The
//! pipeline reports through `PrometheusObserver`. Recording functions are
//! no-ops until a recorder is installed.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::ports::PipelineObserver;
use crate::domain::connection::ConnectionState;
use crate::domain::quote::EntryField;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Later calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "price_tracker_batches_received_total",
        "Total ticker frames received from the feed"
    );
    describe_counter!(
        "price_tracker_batches_malformed_total",
        "Total ticker frames rejected as malformed"
    );
    describe_counter!(
        "price_tracker_entries_accepted_total",
        "Total watch-listed entries merged into the snapshot"
    );
    describe_counter!(
        "price_tracker_entries_invalid_total",
        "Total watch-listed entries rejected for non-numeric fields"
    );
    describe_counter!(
        "price_tracker_sessions_total",
        "Total feed session attempts"
    );

    describe_gauge!(
        "price_tracker_connection_state",
        "Connection state (0 = connecting, 1 = live, 2 = disconnected)"
    );
    describe_gauge!(
        "price_tracker_snapshot_symbols",
        "Number of symbols held in the snapshot"
    );

    describe_histogram!(
        "price_tracker_batch_processing_seconds",
        "Time to decode, filter and merge one ticker frame"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a frame received from the feed.
pub fn record_batch_received() {
    counter!("price_tracker_batches_received_total").increment(1);
}

/// Record a frame rejected as malformed.
pub fn record_batch_malformed() {
    counter!("price_tracker_batches_malformed_total").increment(1);
}

/// Record entries merged into the snapshot.
pub fn record_entries_accepted(count: u64) {
    counter!("price_tracker_entries_accepted_total").increment(count);
}

/// Record an entry rejected for an invalid field.
pub fn record_entry_invalid(field: EntryField) {
    counter!(
        "price_tracker_entries_invalid_total",
        "field" => field.as_str()
    )
    .increment(1);
}

/// Record a session attempt.
pub fn record_session_started() {
    counter!("price_tracker_sessions_total").increment(1);
}

/// Update the connection state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("price_tracker_connection_state").set(connection_state_value(state));
}

/// Update the snapshot size gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_snapshot_symbols(count: usize) {
    gauge!("price_tracker_snapshot_symbols").set(count as f64);
}

/// Record frame processing duration.
pub fn record_batch_duration(duration: Duration) {
    histogram!("price_tracker_batch_processing_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Pipeline Observer
// =============================================================================

/// Feeds pipeline activity into the Prometheus metrics above.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusObserver;

impl PipelineObserver for PrometheusObserver {
    fn session_started(&self) {
        record_session_started();
    }

    fn state_changed(&self, state: ConnectionState) {
        set_connection_state(state);
    }

    fn batch_received(&self) {
        record_batch_received();
    }

    fn batch_malformed(&self) {
        record_batch_malformed();
    }

    fn entry_invalid(&self, field: EntryField) {
        record_entry_invalid(field);
    }

    fn batch_merged(&self, accepted: usize, symbols: usize, elapsed: Duration) {
        record_entries_accepted(accepted as u64);
        set_snapshot_symbols(symbols);
        record_batch_duration(elapsed);
    }
}

const fn connection_state_value(state: ConnectionState) -> f64 {
    match state {
        ConnectionState::Connecting => 0.0,
        ConnectionState::Live => 1.0,
        ConnectionState::Disconnected => 2.0,
    }
}

// =============================================================================
// Tests
// =============================================================================
