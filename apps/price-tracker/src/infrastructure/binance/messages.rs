//! Binance Ticker Message Types
//!
//! Wire format of the all-market rolling window ticker stream
//! (`!ticker@arr`). Each frame is a JSON array with one object per symbol
//! that changed during the last second.
//!
//! # Wire Format (JSON)
//! ```json
//! [{"e":"24hrTicker","E":1672515782136,"s":"BTCUSDT","p":"120.5","P":"2.50","c":"50000.10", ...}]
//! ```
//!
//! Only the fields the tracker uses are modelled; the rest are ignored.
//!
//! # References
//!
//! - [All Market Tickers Stream](https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams#all-market-tickers-stream)

use serde::{Deserialize, Serialize};

use crate::domain::quote::TickerEntry;

/// A numeric field as sent on the wire.
///
/// Binance sends prices as JSON strings; plain JSON numbers are accepted
/// too and kept in their textual form for validation downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericText {
    /// `"50000.10"`
    Text(String),
    /// `50000.10`
    Number(serde_json::Number),
}

impl From<NumericText> for String {
    fn from(value: NumericText) -> Self {
        match value {
            NumericText::Text(text) => text,
            NumericText::Number(number) => number.to_string(),
        }
    }
}

/// One rolling-window ticker object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerMessage {
    /// Event type, `24hrTicker`.
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// Event time in milliseconds since the epoch.
    #[serde(rename = "E", default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<i64>,

    /// Symbol, e.g. `BTCUSDT`.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Last price.
    #[serde(rename = "c")]
    pub last_price: NumericText,

    /// Price change percent over the window.
    #[serde(rename = "P")]
    pub price_change_percent: NumericText,
}

impl From<TickerMessage> for TickerEntry {
    fn from(msg: TickerMessage) -> Self {
        Self {
            symbol: msg.symbol,
            last_price: msg.last_price.into(),
            percent_change: msg.price_change_percent.into(),
        }
    }
}
