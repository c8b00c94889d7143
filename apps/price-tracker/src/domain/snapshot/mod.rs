//! Snapshot Store
//!
//! Holds the latest `QuoteRecord` per symbol and publishes it to readers
//! as an immutable `Arc<Snapshot>`.
//!
//! Writers fold a whole batch into a copy of the current map and then
//! replace the published snapshot in one step, so readers observe either
//! the state before a batch or the state after it, never a mix.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::domain::quote::QuoteRecord;

/// Immutable view of the store at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    version: u64,
    records: HashMap<String, QuoteRecord>,
}

impl Snapshot {
    /// Number of merged batches this view reflects.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Record held for `symbol`.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&QuoteRecord> {
        self.records.get(symbol)
    }

    /// All records, in unspecified order.
    pub fn records(&self) -> impl Iterator<Item = &QuoteRecord> {
        self.records.values()
    }

    /// Whether `symbol` has been observed.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.records.contains_key(symbol)
    }

    /// Number of symbols held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Single-writer store of the latest quote per symbol.
#[derive(Debug)]
pub struct SnapshotStore {
    tx: watch::Sender<Arc<Snapshot>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::default()));
        Self { tx }
    }

    /// Current snapshot.
    ///
    /// The returned view never changes; call again to observe later merges.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.tx.borrow())
    }

    /// Subscribe to snapshot replacements.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    /// Record currently held for `symbol`.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<QuoteRecord> {
        self.tx.borrow().get(symbol).cloned()
    }

    /// Merge a batch of records.
    ///
    /// Each record overwrites the entry for its symbol; symbols absent from
    /// the batch are left untouched. When a symbol repeats within the batch
    /// the last record wins. An empty batch publishes nothing.
    ///
    /// Returns the version of the published snapshot.
    pub fn merge(&self, batch: Vec<QuoteRecord>) -> u64 {
        let current = self.snapshot();
        if batch.is_empty() {
            return current.version;
        }

        let mut records = current.records.clone();
        for record in batch {
            records.insert(record.symbol().to_string(), record);
        }

        let next = Snapshot {
            version: current.version + 1,
            records,
        };
        let version = next.version;
        self.tx.send_replace(Arc::new(next));

        tracing::trace!(version, "Snapshot replaced");
        version
    }
}
