//! Watch-list Filter
//!
//! Decides which ticker entries the tracker keeps. The upstream stream
//! carries every listed instrument, so this filter runs before any
//! parsing or allocation per entry.

use std::collections::HashSet;

/// Default base instruments tracked.
pub const DEFAULT_BASES: [&str; 10] = [
    "BTC", "ETH", "BNB", "SOL", "XRP", "ADA", "DOGE", "DOT", "MATIC", "AVAX",
];

/// Default quote currency suffix.
pub const DEFAULT_QUOTE_SUFFIX: &str = "USDT";

/// Fixed set of base instruments quoted in one currency.
///
/// A symbol is accepted iff it ends with the quote suffix and the prefix
/// left after stripping it is one of the bases. Matching is exact and
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchList {
    bases: HashSet<String>,
    quote_suffix: String,
}

impl Default for WatchList {
    fn default() -> Self {
        Self::new(DEFAULT_BASES, DEFAULT_QUOTE_SUFFIX)
    }
}

impl WatchList {
    /// Create a watch-list from base codes and a quote suffix.
    #[must_use]
    pub fn new<I, S>(bases: I, quote_suffix: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bases: bases.into_iter().map(Into::into).collect(),
            quote_suffix: quote_suffix.into(),
        }
    }

    /// Whether the symbol is tracked.
    #[must_use]
    pub fn accepts(&self, symbol: &str) -> bool {
        self.base_of(symbol).is_some()
    }

    /// The tracked base code of `symbol`, if it is accepted.
    #[must_use]
    pub fn base_of<'a>(&self, symbol: &'a str) -> Option<&'a str> {
        symbol
            .strip_suffix(self.quote_suffix.as_str())
            .filter(|base| !base.is_empty() && self.bases.contains(*base))
    }

    /// Tracked base codes, in no particular order.
    pub fn bases(&self) -> impl Iterator<Item = &str> {
        self.bases.iter().map(String::as_str)
    }

    /// Quote currency suffix.
    #[must_use]
    pub fn quote_suffix(&self) -> &str {
        &self.quote_suffix
    }

    /// Number of tracked bases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// Whether no base is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}
