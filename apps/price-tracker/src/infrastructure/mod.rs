//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the ports defined in the application layer,
//! plus the process-level concerns around them.

/// Binance ticker stream adapter (WebSocket transport, wire codec).
pub mod binance;

/// Configuration from the environment.
pub mod config;

/// Periodic quote table in the log.
pub mod display;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber and OpenTelemetry integration.
pub mod telemetry;
