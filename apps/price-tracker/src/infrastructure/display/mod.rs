//! Log Display
//!
//! Periodically writes the quote table to the log, sorted by symbol. A
//! stand-in for a real presentation layer: it only reads the published
//! snapshot and connection state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::domain::connection::ConnectionState;
use crate::domain::quote::{ChangeSign, PriceDirection, QuoteRecord};
use crate::domain::snapshot::Snapshot;
use crate::domain::watchlist::WatchList;

/// Arrow shown for a price move.
#[must_use]
pub const fn direction_arrow(direction: PriceDirection) -> &'static str {
    match direction {
        PriceDirection::Up => "↑",
        PriceDirection::Down => "↓",
        PriceDirection::Unchanged => "→",
    }
}

/// Pair label, e.g. `BTC/USDT`; the raw symbol if it is not watch-listed.
#[must_use]
pub fn pair_label(watchlist: &WatchList, symbol: &str) -> String {
    watchlist.base_of(symbol).map_or_else(
        || symbol.to_string(),
        |base| format!("{base}/{}", watchlist.quote_suffix()),
    )
}

/// One display line for a record.
#[must_use]
pub fn format_row(watchlist: &WatchList, record: &QuoteRecord) -> String {
    let sign = match record.change_sign() {
        ChangeSign::Positive => "+",
        ChangeSign::Negative | ChangeSign::Zero => "",
    };
    format!(
        "{:<12} {:>16} {} {sign}{}% {}",
        pair_label(watchlist, record.symbol()),
        record.price().to_string(),
        direction_arrow(record.direction()),
        record.change_percent(),
        record.observed_at().format("%H:%M:%S"),
    )
}

/// All display lines, sorted by symbol.
#[must_use]
pub fn render(watchlist: &WatchList, snapshot: &Snapshot) -> Vec<String> {
    let mut records: Vec<&QuoteRecord> = snapshot.records().collect();
    records.sort_by(|a, b| a.symbol().cmp(b.symbol()));
    records
        .into_iter()
        .map(|record| format_row(watchlist, record))
        .collect()
}

/// Log the table every `interval` until cancelled.
pub async fn run(
    watchlist: WatchList,
    snapshots: watch::Receiver<Arc<Snapshot>>,
    states: watch::Receiver<ConnectionState>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let state = *states.borrow();
        let snapshot = Arc::clone(&snapshots.borrow());

        if snapshot.is_empty() {
            tracing::info!(status = %state, "Waiting for quotes");
            continue;
        }

        tracing::info!(
            status = %state,
            symbols = snapshot.len(),
            version = snapshot.version(),
            "Quotes"
        );
        for row in render(&watchlist, &snapshot) {
            tracing::info!("  {row}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quote::TickerEntry;
    use crate::domain::snapshot::SnapshotStore;
    use chrono::Local;

    fn record(symbol: &str, price: &str, change: &str, previous: Option<&QuoteRecord>) -> QuoteRecord {
        QuoteRecord::from_entry(&TickerEntry::new(symbol, price, change), previous, Local::now())
            .unwrap()
    }

    #[test]
    fn pair_label_splits_suffix() {
        let list = WatchList::default();
        assert_eq!(pair_label(&list, "BTCUSDT"), "BTC/USDT");
        assert_eq!(pair_label(&list, "SHIBUSDT"), "SHIBUSDT");
    }

    #[test]
    fn row_shows_arrow_and_signed_change() {
        let list = WatchList::default();
        let first = record("ETHUSDT", "3000", "1.5", None);
        let up = record("ETHUSDT", "3001", "1.5", Some(&first));

        let row = format_row(&list, &up);
        assert!(row.starts_with("ETH/USDT"));
        assert!(row.contains("3001.0000 ↑ +1.50%"));

        let down = record("ETHUSDT", "2999", "-0.2", Some(&up));
        assert!(format_row(&list, &down).contains("2999.0000 ↓ -0.20%"));
    }

    #[test]
    fn render_sorts_by_symbol() {
        let list = WatchList::default();
        let store = SnapshotStore::new();
        store.merge(vec![
            record("XRPUSDT", "0.5", "0", None),
            record("ADAUSDT", "0.3", "0", None),
            record("BTCUSDT", "1", "0", None),
        ]);

        let rows = render(&list, &store.snapshot());
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("ADA/USDT"));
        assert!(rows[1].starts_with("BTC/USDT"));
        assert!(rows[2].starts_with("XRP/USDT"));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let store = SnapshotStore::new();
        let (_tx, states) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();
        cancel.cancel();

        run(
            WatchList::default(),
            store.subscribe(),
            states,
            Duration::from_secs(60),
            cancel,
        )
        .await;
    }
}
