//! Application Layer - Ingestion pipeline and port definitions.
//!
//! The pipeline drives the domain from transport events delivered through
//! the ports defined here. Nothing in this layer depends on an adapter.

/// Port interfaces for transports, decoders and observers.
pub mod ports;

/// Ingestion pipeline: transport events to snapshot merges.
pub mod pipeline;

/// Backoff between feed sessions.
pub mod reconnect;
