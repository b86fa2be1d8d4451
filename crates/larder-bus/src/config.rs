use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Reserved channel the bootstrap sentinel is published on.
pub const BOOTSTRAP_CHANNEL: &str = "larder_hello_world";

/// Configuration for the [`EventBus`](crate::EventBus).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Pattern of the single subscription the bus holds.
    pub pattern: String,
    /// Private channel used for the bootstrap handshake.
    pub bootstrap_channel: String,
    /// How often the sentinel is re-published while bootstrapping.
    pub sentinel_interval: Duration,
    /// Give up bootstrapping after this long. `None` waits forever.
    pub bootstrap_timeout: Option<Duration>,
    pub reconnect: ReconnectPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            pattern: "*".into(),
            bootstrap_channel: BOOTSTRAP_CHANNEL.into(),
            sentinel_interval: Duration::from_millis(10),
            bootstrap_timeout: None,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Exponential backoff between resubscribe attempts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Factor applied to the backoff after each failed attempt.
    pub multiplier: f64,
    /// Up to this fraction of the delay is added at random.
    pub jitter: f64,
    /// Stop after this many attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff before attempt `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(scaled)
    }

    /// Backoff before attempt `attempt` with random jitter applied.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..=jitter);
        base.mul_f64(1.0 + extra)
    }

    /// Whether attempt `attempt` (1-based) is allowed.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = BusConfig::default();
        assert_eq!(c.pattern, "*");
        assert_eq!(c.bootstrap_channel, "larder_hello_world");
        assert_eq!(c.sentinel_interval, Duration::from_millis(10));
        assert!(c.bootstrap_timeout.is_none());
        assert!(c.reconnect.max_attempts.is_none());
    }

    #[test]
    fn backoff_grows_and_caps() {
        let p = ReconnectPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: 0.0,
            max_attempts: None,
        };
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(4), Duration::from_millis(800));
        assert_eq!(p.backoff(5), Duration::from_secs(1));
        assert_eq!(p.backoff(500), Duration::from_secs(1));
        assert_eq!(p.delay(3), p.backoff(3));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = ReconnectPolicy {
            jitter: 0.5,
            ..Default::default()
        };
        for _ in 0..100 {
            let d = p.delay(1);
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn attempt_limit() {
        let p = ReconnectPolicy {
            max_attempts: Some(3),
            ..Default::default()
        };
        assert!(p.allows(3));
        assert!(!p.allows(4));
        assert!(ReconnectPolicy::default().allows(u32::MAX));
    }

    #[test]
    fn parses_partial_toml() {
        let c: BusConfig = toml::from_str(
            r#"
            pattern = "item:*"

            [reconnect]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(c.pattern, "item:*");
        assert_eq!(c.bootstrap_channel, BOOTSTRAP_CHANNEL);
        assert_eq!(c.reconnect.max_attempts, Some(5));
        assert_eq!(c.reconnect.multiplier, 2.0);
    }
}
