//! Domain Layer - Quote model, filtering, snapshot and connection state.
//!
//! Everything here is synchronous and transport-agnostic.

/// Connection availability state machine.
pub mod connection;

/// Quote records and their construction from raw ticker entries.
pub mod quote;

/// Latest-quote-per-symbol store with atomic batch merge.
pub mod snapshot;

/// Watch-list filter over instrument codes.
pub mod watchlist;
