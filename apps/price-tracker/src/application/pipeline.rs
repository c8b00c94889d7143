//! Ingestion Pipeline
//!
//! Consumes transport events one at a time, in delivery order, and turns
//! ticker batches into snapshot merges. Each batch is decoded, filtered
//! against the watch-list, converted into quote records against the
//! pre-batch snapshot, and merged in one step.
//!
//! # Session Lifecycle
//!
//! ```text
//! run_session
//!   SessionStart -> Connecting
//!   connect()            (bounded by connect_timeout)
//!   loop next_event()
//!     Open            -> Live
//!     Message(bytes)  -> ingest
//!     Error | Close   -> Disconnected, session ends
//!   close() if still open -> Disconnected
//! ```
//!
//! Cancellation is checked before every transport event and wins over
//! any event that is ready at the same time.
//!
//! The wire format and the metrics sink are supplied through the
//! `BatchDecoder` and `PipelineObserver` ports.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::application::ports::{
    BatchDecoder, FeedTransport, MalformedBatchError, NoopObserver, PipelineObserver,
    TransportEvent,
};
use crate::application::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::domain::connection::{ConnectionMonitor, ConnectionState, LifecycleTrigger};
use crate::domain::quote::QuoteRecord;
use crate::domain::snapshot::{Snapshot, SnapshotStore};
use crate::domain::watchlist::WatchList;

// =============================================================================
// Configuration
// =============================================================================

/// Pipeline behavior settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Time allowed for a session to go live.
    pub connect_timeout: Duration,
    /// Backoff between sessions; `None` runs a single session.
    pub reconnect: Option<ReconnectConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect: None,
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Whether the current session continues after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    /// Keep reading events.
    Continue,
    /// The session is over.
    End,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Teardown was requested.
    Cancelled,
    /// The transport failed or closed.
    Closed {
        /// Whether the session reached `Live` first.
        went_live: bool,
    },
    /// The session did not go live within the connect timeout.
    TimedOut,
}

/// Result of ingesting one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    /// Entries decoded from the batch.
    pub entries: usize,
    /// Entries merged into the snapshot.
    pub accepted: usize,
    /// Entries outside the watch-list.
    pub filtered: usize,
    /// Watch-listed entries with an invalid numeric field.
    pub invalid: usize,
    /// Snapshot version after the merge.
    pub version: u64,
}

// =============================================================================
// Pipeline
// =============================================================================

/// Drives the snapshot store and connection state from transport events.
#[derive(Debug)]
pub struct IngestionPipeline {
    watchlist: WatchList,
    store: Arc<SnapshotStore>,
    connection: Arc<ConnectionMonitor>,
    decoder: Box<dyn BatchDecoder>,
    observer: Box<dyn PipelineObserver>,
    config: PipelineConfig,
}

impl IngestionPipeline {
    /// Create a pipeline with an empty store, in the `Connecting` state.
    ///
    /// Nothing is observed until `with_observer` supplies an observer.
    #[must_use]
    pub fn new(
        watchlist: WatchList,
        decoder: impl BatchDecoder + 'static,
        config: PipelineConfig,
    ) -> Self {
        Self {
            watchlist,
            store: Arc::new(SnapshotStore::new()),
            connection: Arc::new(ConnectionMonitor::new()),
            decoder: Box::new(decoder),
            observer: Box::new(NoopObserver),
            config,
        }
    }

    /// Report pipeline activity to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: impl PipelineObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Snapshot store, for readers.
    #[must_use]
    pub const fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Connection monitor, for readers.
    #[must_use]
    pub const fn connection(&self) -> &Arc<ConnectionMonitor> {
        &self.connection
    }

    /// Subscribe to snapshot replacements.
    #[must_use]
    pub fn snapshots(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.store.subscribe()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn connection_states(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// Watch-list in use.
    #[must_use]
    pub const fn watchlist(&self) -> &WatchList {
        &self.watchlist
    }

    /// Process one transport event.
    pub fn handle_event(&self, event: TransportEvent) -> SessionControl {
        match event {
            TransportEvent::Open => {
                self.transition(LifecycleTrigger::Open);
                tracing::info!("Feed live");
                SessionControl::Continue
            }
            TransportEvent::Message(payload) => {
                self.connection.record_batch();
                self.observer.batch_received();
                match self.ingest(&payload) {
                    Ok(summary) => {
                        tracing::trace!(
                            entries = summary.entries,
                            accepted = summary.accepted,
                            invalid = summary.invalid,
                            version = summary.version,
                            "Batch merged"
                        );
                    }
                    Err(e) => {
                        let (line, column) = e.position();
                        self.observer.batch_malformed();
                        tracing::warn!(error = %e, line, column, "Dropping malformed batch");
                    }
                }
                SessionControl::Continue
            }
            TransportEvent::Error(e) => {
                self.transition(LifecycleTrigger::Error);
                tracing::warn!(error = %e, "Feed error");
                SessionControl::End
            }
            TransportEvent::Close { code, reason } => {
                self.transition(LifecycleTrigger::Close);
                tracing::info!(?code, %reason, "Feed closed");
                SessionControl::End
            }
        }
    }

    /// Decode one batch and merge its watch-listed entries.
    ///
    /// Every record is built against the snapshot as it was before the
    /// batch, so a symbol repeated within the batch keeps the pre-batch
    /// price as `previous_price` and its last occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns `MalformedBatchError` if the payload does not decode; the
    /// store is left untouched.
    pub fn ingest(&self, payload: &[u8]) -> Result<BatchSummary, MalformedBatchError> {
        let started = Instant::now();
        let entries = self.decoder.decode(payload)?;

        let current = self.store.snapshot();
        let observed_at = Local::now();
        let mut summary = BatchSummary {
            entries: entries.len(),
            ..BatchSummary::default()
        };

        let mut records = Vec::with_capacity(entries.len());
        for entry in &entries {
            if !self.watchlist.accepts(&entry.symbol) {
                summary.filtered += 1;
                continue;
            }

            match QuoteRecord::from_entry(entry, current.get(&entry.symbol), observed_at) {
                Ok(record) => records.push(record),
                Err(e) => {
                    summary.invalid += 1;
                    self.observer.entry_invalid(e.field);
                    tracing::debug!(error = %e, "Dropping invalid entry");
                }
            }
        }

        summary.accepted = records.len();
        summary.version = self.store.merge(records);

        self.observer
            .batch_merged(summary.accepted, self.store.snapshot().len(), started.elapsed());

        Ok(summary)
    }

    /// Run one session on `transport` until it ends or `cancel` fires.
    ///
    /// The transport is closed on the way out if it is still open, which
    /// leaves the state `Disconnected` whatever ended the session.
    pub async fn run_session<T>(&self, transport: &mut T, cancel: &CancellationToken) -> SessionEnd
    where
        T: FeedTransport + ?Sized,
    {
        if cancel.is_cancelled() {
            return SessionEnd::Cancelled;
        }

        self.transition(LifecycleTrigger::SessionStart);
        self.observer.session_started();

        let deadline = tokio::time::sleep(self.config.connect_timeout);
        tokio::pin!(deadline);

        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => Some(SessionEnd::Cancelled),
            () = &mut deadline => Some(self.time_out()),
            () = transport.connect() => None,
        };

        let end = match connected {
            Some(end) => end,
            None => {
                let mut went_live = false;
                loop {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break SessionEnd::Cancelled,
                        () = &mut deadline, if !went_live => break self.time_out(),
                        event = transport.next_event() => {
                            let Some(event) = event else {
                                self.transition(LifecycleTrigger::Close);
                                tracing::info!("Feed ended without close frame");
                                break SessionEnd::Closed { went_live };
                            };
                            went_live |= event == TransportEvent::Open;
                            if self.handle_event(event) == SessionControl::End {
                                break SessionEnd::Closed { went_live };
                            }
                        }
                    }
                }
            }
        };

        if transport.is_open() {
            transport.close().await;
            self.transition(LifecycleTrigger::Close);
            tracing::info!(?end, "Transport closed at session end");
        }
        end
    }

    /// Run sessions until cancelled, reconnecting when configured to.
    ///
    /// Without a reconnect policy this returns after the first session.
    pub async fn run<T>(&self, transport: &mut T, cancel: CancellationToken)
    where
        T: FeedTransport + ?Sized,
    {
        let mut policy = self.config.reconnect.clone().map(ReconnectPolicy::new);

        loop {
            let session_id = Uuid::new_v4();
            let span = tracing::info_span!("session", %session_id);
            let end = self.run_session(transport, &cancel).instrument(span).await;

            let Some(policy) = policy.as_mut() else {
                tracing::debug!(?end, "Session ended; reconnect disabled");
                return;
            };

            match end {
                SessionEnd::Cancelled => return,
                SessionEnd::Closed { went_live: true } => policy.reset(),
                SessionEnd::Closed { went_live: false } | SessionEnd::TimedOut => {}
            }

            let Some(delay) = policy.next_delay() else {
                tracing::warn!(attempts = policy.attempts(), "Reconnect attempts exhausted");
                return;
            };

            tracing::info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                attempt = policy.attempts(),
                "Reconnecting"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn time_out(&self) -> SessionEnd {
        self.transition(LifecycleTrigger::ConnectTimeout);
        tracing::warn!(
            timeout_secs = self.config.connect_timeout.as_secs_f64(),
            "Feed did not go live in time"
        );
        SessionEnd::TimedOut
    }

    fn transition(&self, trigger: LifecycleTrigger) {
        let state = self.connection.apply(trigger);
        self.observer.state_changed(state);
    }
}

// =============================================================================
// Tests
// =============================================================================
