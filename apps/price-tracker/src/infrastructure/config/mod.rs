//! Configuration Module
//!
//! Environment-driven configuration for the tracker.

mod settings;

pub use settings::{
    ConfigError, ConnectionSettings, FeedSettings, ServerSettings, TrackerConfig,
};
