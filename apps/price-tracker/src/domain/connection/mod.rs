//! Connection State Machine
//!
//! Tracks feed availability and publishes it as a single current-value
//! signal. Only transport lifecycle triggers move the state; the quote path
//! never does.
//!
//! ```text
//!   session start --> Connecting --open--> Live
//!                         |                  |
//!          error/close/timeout          error/close
//!                         v                  v
//!                    Disconnected <----------+
//!                         |
//!                         +-- session start --> Connecting
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;

/// Feed availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// A session is being established.
    #[default]
    Connecting,
    /// The transport is open and delivering batches.
    Live,
    /// The transport closed or failed.
    Disconnected,
}

impl ConnectionState {
    /// State name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Live => "live",
            Self::Disconnected => "disconnected",
        }
    }

    /// State entered after `trigger`.
    ///
    /// Every trigger is accepted from every state; there is no terminal state.
    #[must_use]
    pub const fn next(self, trigger: LifecycleTrigger) -> Self {
        match trigger {
            LifecycleTrigger::SessionStart => Self::Connecting,
            LifecycleTrigger::Open => Self::Live,
            LifecycleTrigger::Error
            | LifecycleTrigger::Close
            | LifecycleTrigger::ConnectTimeout => Self::Disconnected,
        }
    }

    /// Whether the feed is delivering data.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport lifecycle occurrence that drives the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleTrigger {
    /// A fresh session attempt begins.
    SessionStart,
    /// The transport reported a successful open.
    Open,
    /// The transport reported an error.
    Error,
    /// The transport closed.
    Close,
    /// The session did not open within the connect timeout.
    ConnectTimeout,
}

/// Owner of the process-wide connection state.
#[derive(Debug)]
pub struct ConnectionMonitor {
    tx: watch::Sender<ConnectionState>,
    last_live_at: RwLock<Option<DateTime<Utc>>>,
    sessions_started: AtomicU64,
    batches_received: AtomicU64,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMonitor {
    /// Create a monitor in the `Connecting` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Connecting);
        Self {
            tx,
            last_live_at: RwLock::new(None),
            sessions_started: AtomicU64::new(0),
            batches_received: AtomicU64::new(0),
        }
    }

    /// Apply a lifecycle trigger and return the resulting state.
    ///
    /// Subscribers are only woken when the state actually changes.
    pub fn apply(&self, trigger: LifecycleTrigger) -> ConnectionState {
        let mut previous = ConnectionState::Connecting;
        let mut next = ConnectionState::Connecting;
        self.tx.send_if_modified(|state| {
            previous = *state;
            next = state.next(trigger);
            *state = next;
            previous != next
        });

        match trigger {
            LifecycleTrigger::SessionStart => {
                self.sessions_started.fetch_add(1, Ordering::Relaxed);
            }
            LifecycleTrigger::Open => {
                *self.last_live_at.write() = Some(Utc::now());
            }
            _ => {}
        }

        if previous != next {
            tracing::debug!(from = %previous, to = %next, ?trigger, "Connection state changed");
        }
        next
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Subscribe to state changes. Receivers only ever see the latest state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Count one inbound batch, whether or not it decoded.
    pub fn record_batch(&self) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Feed statistics for health reporting.
    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            state: self.state(),
            last_live_at: *self.last_live_at.read(),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            batches_received: self.batches_received.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time feed statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    /// Current state.
    pub state: ConnectionState,
    /// Last time the feed went live.
    pub last_live_at: Option<DateTime<Utc>>,
    /// Session attempts since start.
    pub sessions_started: u64,
    /// Inbound batches since start.
    pub batches_received: u64,
}
