//! Quote Records
//!
//! The value type holding one instrument's latest known quote, and its
//! construction from a raw ticker entry.
//!
//! Prices are kept at 4 decimal places and percent changes at 2, rounded
//! half away from zero. The stored decimals always carry exactly that
//! scale, so their `Display` output is the fixed-width display form
//! (`42123.4568`, `-3.10`).

use std::str::FromStr;

use chrono::{DateTime, Local};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Decimal places kept for prices.
pub const PRICE_SCALE: u32 = 4;

/// Decimal places kept for percent changes.
pub const CHANGE_SCALE: u32 = 2;

// =============================================================================
// Raw Entries
// =============================================================================

/// One ticker entry as received from the feed, before validation.
///
/// Numeric fields are kept as the original text so validation can report
/// exactly what was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerEntry {
    /// Instrument code, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Last traded price.
    pub last_price: String,
    /// 24h percent change.
    pub percent_change: String,
}

impl TickerEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        last_price: impl Into<String>,
        percent_change: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            last_price: last_price.into(),
            percent_change: percent_change.into(),
        }
    }
}

/// Numeric field of a ticker entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    /// Last price (`c` on the wire).
    LastPrice,
    /// 24h percent change (`P` on the wire).
    PercentChange,
}

impl EntryField {
    /// Field name used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastPrice => "last_price",
            Self::PercentChange => "percent_change",
        }
    }
}

impl std::fmt::Display for EntryField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a numeric field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidReason {
    /// Not a finite number.
    #[error("not a number")]
    NotANumber,
    /// Finite, but too large to hold at the display scale.
    #[error("out of range")]
    OutOfRange,
}

/// A ticker entry whose numeric field cannot be shown at its display scale.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} for {symbol}: {value:?} ({reason})")]
pub struct InvalidEntryError {
    /// Symbol of the rejected entry.
    pub symbol: String,
    /// Offending field.
    pub field: EntryField,
    /// Text as received.
    pub value: String,
    /// What is wrong with it.
    pub reason: InvalidReason,
}

// =============================================================================
// Quote Record
// =============================================================================

/// Direction of the last price move, derived from `previous_price`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    /// Price rose since the previous record.
    Up,
    /// Price fell since the previous record.
    Down,
    /// Price did not move, or this is the first observation.
    Unchanged,
}

/// Sign of the 24h percent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSign {
    /// Positive change.
    Positive,
    /// Negative change.
    Negative,
    /// No change.
    Zero,
}

/// Latest known state of one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    symbol: String,
    price: Decimal,
    change_percent: Decimal,
    observed_at: DateTime<Local>,
    previous_price: Decimal,
}

impl QuoteRecord {
    /// Build a record from a raw entry.
    ///
    /// `previous` is the record currently held for the same symbol, if any.
    /// Its price becomes `previous_price`; without one, `previous_price`
    /// equals the new price.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEntryError` if the price or percent change is not a
    /// finite number, or too large to keep at its scale.
    pub fn from_entry(
        entry: &TickerEntry,
        previous: Option<&Self>,
        observed_at: DateTime<Local>,
    ) -> Result<Self, InvalidEntryError> {
        let price = parse_rounded(entry, EntryField::LastPrice, PRICE_SCALE)?;
        let change_percent = parse_rounded(entry, EntryField::PercentChange, CHANGE_SCALE)?;
        let previous_price = previous.map_or(price, |p| p.price);

        Ok(Self {
            symbol: entry.symbol.clone(),
            price,
            change_percent,
            observed_at,
            previous_price,
        })
    }

    /// Instrument code.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Current price, 4 decimal places.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// 24h percent change, 2 decimal places.
    #[must_use]
    pub const fn change_percent(&self) -> Decimal {
        self.change_percent
    }

    /// Local time this record was produced.
    #[must_use]
    pub const fn observed_at(&self) -> DateTime<Local> {
        self.observed_at
    }

    /// Price held before this update.
    #[must_use]
    pub const fn previous_price(&self) -> Decimal {
        self.previous_price
    }

    /// Direction of the move from `previous_price` to `price`.
    #[must_use]
    pub fn direction(&self) -> PriceDirection {
        match self.price.cmp(&self.previous_price) {
            std::cmp::Ordering::Greater => PriceDirection::Up,
            std::cmp::Ordering::Less => PriceDirection::Down,
            std::cmp::Ordering::Equal => PriceDirection::Unchanged,
        }
    }

    /// Sign of the 24h change.
    #[must_use]
    pub fn change_sign(&self) -> ChangeSign {
        if self.change_percent.is_zero() {
            ChangeSign::Zero
        } else if self.change_percent.is_sign_negative() {
            ChangeSign::Negative
        } else {
            ChangeSign::Positive
        }
    }
}

// =============================================================================
// Numeric Parsing
// =============================================================================

/// Parse a numeric text field and round it to `scale` places.
fn parse_rounded(
    entry: &TickerEntry,
    field: EntryField,
    scale: u32,
) -> Result<Decimal, InvalidEntryError> {
    let text = match field {
        EntryField::LastPrice => &entry.last_price,
        EntryField::PercentChange => &entry.percent_change,
    };

    parse_decimal(text)
        .and_then(|value| round_to_scale(value, scale).ok_or(InvalidReason::OutOfRange))
        .map_err(|reason| InvalidEntryError {
            symbol: entry.symbol.clone(),
            field,
            value: text.clone(),
            reason,
        })
}

/// Magnitude below which a finite number that `Decimal` cannot hold is
/// taken as zero. Far below half a unit at any scale kept here.
const NEGLIGIBLE: f64 = 1e-20;

/// Parse plain or scientific decimal text.
///
/// `Decimal` has no NaN or infinity, so anything it accepts is finite.
/// Finite text beyond its 28 fraction digits reads as zero; beyond its
/// 96-bit mantissa it is out of range.
fn parse_decimal(text: &str) -> Result<Decimal, InvalidReason> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InvalidReason::NotANumber);
    }

    if let Ok(value) = Decimal::from_str(trimmed).or_else(|_| Decimal::from_scientific(trimmed)) {
        return Ok(value);
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value.abs() < NEGLIGIBLE => Ok(Decimal::ZERO),
        Ok(value) if value.is_finite() => Err(InvalidReason::OutOfRange),
        _ => Err(InvalidReason::NotANumber),
    }
}

/// Round half away from zero and pad to exactly `scale` fraction digits.
///
/// Returns `None` if the value has too many integer digits to carry
/// `scale` fraction digits.
pub fn round_to_scale(value: Decimal, scale: u32) -> Option<Decimal> {
    let mut rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(scale);
    if rounded.scale() != scale {
        return None;
    }
    if rounded.is_zero() {
        // -0.001 rounds to zero; keep it unsigned
        rounded.set_sign_positive(true);
    }
    Some(rounded)
}
