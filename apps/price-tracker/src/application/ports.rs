//! Port Interfaces
//!
//! Defines the interfaces (ports) the pipeline depends on, following the
//! Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `FeedTransport`: a streaming connection delivering ticker batches
//! - `BatchDecoder`: turns one undecoded batch payload into ticker entries
//! - `PipelineObserver`: receives ingestion and lifecycle counts

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::connection::ConnectionState;
use crate::domain::quote::{EntryField, TickerEntry};

// =============================================================================
// Transport
// =============================================================================

/// Failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("failed to open transport: {0}")]
    Open(String),

    /// An established connection failed.
    #[error("transport dropped: {0}")]
    Dropped(String),
}

/// Lifecycle and data events emitted by a transport, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The session is established.
    Open,
    /// One batch payload, undecoded and unvalidated bytes.
    Message(Vec<u8>),
    /// The session failed. No further events follow.
    Error(TransportError),
    /// The session closed. No further events follow.
    Close {
        /// Close code, if the peer sent one.
        code: Option<u16>,
        /// Close reason, possibly empty.
        reason: String,
    },
}

impl TransportEvent {
    /// A `Message` event carrying `payload`.
    pub fn message(payload: impl Into<Vec<u8>>) -> Self {
        Self::Message(payload.into())
    }
}

/// A streaming connection to a market data feed.
///
/// One transport value may host several sessions in sequence: each
/// `connect` starts a fresh session whose outcome is reported through
/// `next_event` (`Open` or `Error` first).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedTransport: Send {
    /// Start a new session.
    async fn connect(&mut self);

    /// Next event of the current session.
    ///
    /// Returns `None` once the session has ended and all its events were
    /// delivered, or if no session was started.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Close the current session. Safe to call in any state, repeatedly.
    async fn close(&mut self);

    /// Whether a session is currently open.
    fn is_open(&self) -> bool;
}

// =============================================================================
// Decoding
// =============================================================================

/// A payload that is not a well-formed ticker batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed ticker batch: {message}")]
pub struct MalformedBatchError {
    message: String,
    line: usize,
    column: usize,
}

impl MalformedBatchError {
    /// Error at `line`/`column` of the payload (1-based; 0 if unknown).
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }

    /// Line and column where decoding failed.
    #[must_use]
    pub const fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }
}

/// Wire format of the feed.
///
/// A payload decodes as a whole or not at all; numeric validation of the
/// entries is left to record construction.
pub trait BatchDecoder: Send + Sync + fmt::Debug {
    /// Decode one payload into entries, preserving order.
    ///
    /// # Errors
    ///
    /// Returns `MalformedBatchError` if the payload is not a batch.
    fn decode(&self, payload: &[u8]) -> Result<Vec<TickerEntry>, MalformedBatchError>;
}

// =============================================================================
// Observation
// =============================================================================

/// Receives what the pipeline did. Every method defaults to a no-op.
pub trait PipelineObserver: Send + Sync + fmt::Debug {
    /// A session began connecting.
    fn session_started(&self) {}

    /// The connection state after a lifecycle trigger.
    fn state_changed(&self, _state: ConnectionState) {}

    /// A batch payload arrived.
    fn batch_received(&self) {}

    /// A batch payload was dropped as malformed.
    fn batch_malformed(&self) {}

    /// A watch-listed entry was dropped for an invalid field.
    fn entry_invalid(&self, _field: EntryField) {}

    /// A batch was merged: records accepted, snapshot size afterwards and
    /// time spent.
    fn batch_merged(&self, _accepted: usize, _symbols: usize, _elapsed: Duration) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
