//! Reconnect Backoff
//!
//! Exponential backoff with jitter between feed sessions. Reconnection is
//! opt-in: the pipeline only consults a policy when one is configured.

use std::time::Duration;

use rand::Rng;

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any delay, before jitter.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Relative jitter, e.g. 0.1 for ±10%.
    pub jitter: f64,
    /// Retries allowed before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
            max_attempts: 0,
        }
    }
}

/// Stateful backoff sequence.
///
/// ```rust
/// use price_tracker::application::reconnect::{ReconnectConfig, ReconnectPolicy};
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
/// assert!(policy.next_delay().is_some());
///
/// // the session reached live again
/// policy.reset();
/// assert_eq!(policy.attempts(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    base: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy at its first attempt.
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        let base = config.initial_delay.min(config.max_delay);
        Self {
            config,
            base,
            attempts: 0,
        }
    }

    /// Delay before the next retry, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.exhausted() {
            return None;
        }
        self.attempts += 1;

        let delay = jittered(self.base, self.config.jitter);
        self.base = grow(self.base, self.config.multiplier).min(self.config.max_delay);
        Some(delay)
    }

    /// Start over after a session went live.
    pub fn reset(&mut self) {
        self.base = self.config.initial_delay.min(self.config.max_delay);
        self.attempts = 0;
    }

    /// Retries handed out since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the attempt budget is spent.
    #[must_use]
    pub const fn exhausted(&self) -> bool {
        self.config.max_attempts != 0 && self.attempts >= self.config.max_attempts
    }
}

fn grow(delay: Duration, multiplier: f64) -> Duration {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return delay;
    }
    scale(delay, multiplier)
}

fn jittered(delay: Duration, jitter: f64) -> Duration {
    if !jitter.is_finite() || jitter <= 0.0 {
        return delay;
    }
    let factor = rand::rng().random_range((1.0 - jitter).max(0.0)..=(1.0 + jitter));
    scale(delay, factor)
}

/// Multiply at nanosecond resolution, saturating at `u64::MAX` nanoseconds.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn scale(delay: Duration, factor: f64) -> Duration {
    let nanos = (delay.as_nanos() as f64 * factor).round();
    if nanos >= u64::MAX as f64 {
        Duration::from_nanos(u64::MAX)
    } else {
        Duration::from_nanos(nanos.max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn no_jitter(initial_ms: u64, max_ms: u64, multiplier: f64, max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            multiplier,
            jitter: 0.0,
            max_attempts,
        }
    }

    #[test]
    fn doubles_until_capped() {
        let mut policy = ReconnectPolicy::new(no_jitter(100, 700, 2.0, 0));
        let delays: Vec<u128> = (0..5)
            .map(|_| policy.next_delay().unwrap().as_millis())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 700, 700]);
    }

    #[test]
    fn stops_after_max_attempts() {
        let mut policy = ReconnectPolicy::new(no_jitter(10, 100, 2.0, 2));
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.exhausted());
        assert!(policy.next_delay().is_none());
        assert_eq!(policy.attempts(), 2);
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut policy = ReconnectPolicy::new(no_jitter(50, 1_000, 3.0, 2));
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        policy.reset();

        assert!(!policy.exhausted());
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(50)));
    }

    #[test_case(0.0 ; "zero")]
    #[test_case(-1.0 ; "negative")]
    #[test_case(f64::NAN ; "nan")]
    fn degenerate_multiplier_keeps_delay(multiplier: f64) {
        let mut policy = ReconnectPolicy::new(no_jitter(100, 1_000, multiplier, 0));
        let _ = policy.next_delay();
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn jitter_stays_in_band() {
        for _ in 0..200 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig {
                jitter: 0.1,
                ..no_jitter(1_000, 10_000, 2.0, 0)
            });
            let millis = policy.next_delay().unwrap().as_millis();
            assert!((900..=1_100).contains(&millis), "{millis}ms out of band");
        }
    }
}
