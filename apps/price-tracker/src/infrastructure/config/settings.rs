//! Tracker Configuration Settings
//!
//! Configuration types for the tracker, loaded from environment variables.
//! Unset or unparsable numeric values fall back to their defaults. The
//! pipeline and backoff configuration are derived from these settings here.

use std::str::FromStr;
use std::time::Duration;

use crate::application::pipeline::PipelineConfig;
use crate::application::reconnect::ReconnectConfig;
use crate::domain::watchlist::{DEFAULT_BASES, DEFAULT_QUOTE_SUFFIX, WatchList};
use crate::infrastructure::binance::DEFAULT_STREAM_URL;

/// Feed endpoint and instrument selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// Ticker stream WebSocket URL.
    pub stream_url: String,
    /// Base instrument codes to track.
    pub watchlist: Vec<String>,
    /// Quote currency suffix.
    pub quote_suffix: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            stream_url: DEFAULT_STREAM_URL.to_string(),
            watchlist: DEFAULT_BASES.iter().map(ToString::to_string).collect(),
            quote_suffix: DEFAULT_QUOTE_SUFFIX.to_string(),
        }
    }
}

/// Session establishment and reconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    /// Time allowed for a session to go live.
    pub connect_timeout: Duration,
    /// Whether to open a new session after a disconnect.
    pub reconnect_enabled: bool,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect_enabled: false,
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8082 }
    }
}

/// Complete tracker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Feed endpoint and watch-list.
    pub feed: FeedSettings,
    /// Session settings.
    pub connection: ConnectionSettings,
    /// Server port settings.
    pub server: ServerSettings,
    /// Period of the log display (zero disables it).
    pub display_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            feed: FeedSettings::default(),
            connection: ConnectionSettings::default(),
            server: ServerSettings::default(),
            display_interval: Duration::from_secs(5),
        }
    }
}

impl TrackerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch-list or quote suffix is set but empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch-list or quote suffix is set but empty.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let stream_url = lookup("TRACKER_STREAM_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.feed.stream_url);

        let watchlist = match lookup("TRACKER_WATCHLIST") {
            Some(raw) => {
                let bases = parse_watchlist(&raw);
                if bases.is_empty() {
                    return Err(ConfigError::EmptyValue("TRACKER_WATCHLIST".to_string()));
                }
                bases
            }
            None => defaults.feed.watchlist,
        };

        let quote_suffix = match lookup("TRACKER_QUOTE_SUFFIX") {
            Some(raw) => {
                let suffix = raw.trim().to_uppercase();
                if suffix.is_empty() {
                    return Err(ConfigError::EmptyValue("TRACKER_QUOTE_SUFFIX".to_string()));
                }
                suffix
            }
            None => defaults.feed.quote_suffix,
        };

        let d = defaults.connection;
        let connection = ConnectionSettings {
            // must be positive; 0 falls back like an unparsable value
            connect_timeout: lookup("TRACKER_CONNECT_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|&secs| secs > 0)
                .map_or(d.connect_timeout, Duration::from_secs),
            reconnect_enabled: lookup("TRACKER_RECONNECT_ENABLED")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(d.reconnect_enabled),
            reconnect_delay_initial: Duration::from_millis(parse_or(
                &lookup,
                "TRACKER_RECONNECT_DELAY_INITIAL_MS",
                duration_millis(d.reconnect_delay_initial),
            )),
            reconnect_delay_max: Duration::from_secs(parse_or(
                &lookup,
                "TRACKER_RECONNECT_DELAY_MAX_SECS",
                d.reconnect_delay_max.as_secs(),
            )),
            reconnect_delay_multiplier: parse_or(
                &lookup,
                "TRACKER_RECONNECT_DELAY_MULTIPLIER",
                d.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_or(
                &lookup,
                "TRACKER_MAX_RECONNECT_ATTEMPTS",
                d.max_reconnect_attempts,
            ),
        };

        let server = ServerSettings {
            health_port: parse_or(&lookup, "TRACKER_HEALTH_PORT", defaults.server.health_port),
        };

        let display_interval = Duration::from_secs(parse_or(
            &lookup,
            "TRACKER_DISPLAY_INTERVAL_SECS",
            defaults.display_interval.as_secs(),
        ));

        Ok(Self {
            feed: FeedSettings {
                stream_url,
                watchlist,
                quote_suffix,
            },
            connection,
            server,
            display_interval,
        })
    }

    /// Watch-list filter described by the feed settings.
    #[must_use]
    pub fn watchlist(&self) -> WatchList {
        WatchList::new(self.feed.watchlist.iter().cloned(), self.feed.quote_suffix.clone())
    }
}

impl ConnectionSettings {
    /// Backoff between sessions, or `None` when reconnection is disabled.
    #[must_use]
    pub fn reconnect_config(&self) -> Option<ReconnectConfig> {
        self.reconnect_enabled.then(|| ReconnectConfig {
            initial_delay: self.reconnect_delay_initial,
            max_delay: self.reconnect_delay_max,
            multiplier: self.reconnect_delay_multiplier,
            max_attempts: self.max_reconnect_attempts,
            ..ReconnectConfig::default()
        })
    }
}

impl From<&TrackerConfig> for PipelineConfig {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            connect_timeout: config.connection.connect_timeout,
            reconnect: config.connection.reconnect_config(),
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable is set but has no usable value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

/// Split a comma separated list of base codes, upper-cased, without
/// blanks or duplicates, keeping first occurrence order.
fn parse_watchlist(raw: &str) -> Vec<String> {
    let mut bases: Vec<String> = Vec::new();
    for base in raw.split(',').map(|b| b.trim().to_uppercase()) {
        if !base.is_empty() && !bases.contains(&base) {
            bases.push(base);
        }
    }
    bases
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
