//! Exponential reconnect backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnect pacing.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first attempt. Default: 1 s.
    pub initial_delay: Duration,
    /// Multiplier applied after each failed attempt. Default: 2.0.
    pub multiplier: f64,
    /// Ceiling for the delay. Default: 30 s.
    pub max_delay: Duration,
    /// Attempts before giving up. Default: 20.
    pub max_attempts: u32,
    /// Jitter factor (0.0–1.0) applied as ±jitter. Default: 0.25.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 20,
            jitter: 0.25,
        }
    }
}

/// Tracks attempts and computes the next delay.
pub struct ReconnectBackoff {
    config: BackoffConfig,
    attempts: u32,
    current_delay: Duration,
}

impl ReconnectBackoff {
    /// Creates a fresh backoff from the config.
    pub fn new(config: BackoffConfig) -> Self {
        let initial = config.initial_delay;
        Self {
            config,
            attempts: 0,
            current_delay: initial,
        }
    }

    /// Next delay to wait before attempting, or `None` once attempts are
    /// exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }
        let base = self.current_delay;
        self.attempts += 1;

        let jittered = if self.config.jitter > 0.0 {
            let mut rng = rand::rng();
            let factor =
                rng.random_range((1.0 - self.config.jitter)..=(1.0 + self.config.jitter));
            base.mul_f64(factor)
        } else {
            base
        };

        self.current_delay = self
            .current_delay
            .mul_f64(self.config.multiplier)
            .min(self.config.max_delay);

        Some(jittered.min(self.config.max_delay))
    }

    /// Resets after a successful reconnect.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current_delay = self.config.initial_delay;
    }

    /// Attempts made since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
