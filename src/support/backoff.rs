//! Exponential backoff for upstream reconnects
//!
//! Tracks attempts and hands out the delay before the next one. The delay
//! grows by `multiplier` after every attempt and is capped at `max_delay`.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    /// Total attempts allowed, including the first one. 0 means unlimited.
    max_attempts: u32,
    attempts: u32,
    next: Duration,
}

impl Backoff {
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: multiplier.max(1.0),
            max_attempts,
            attempts: 1,
            next: initial_delay,
        }
    }

    /// Attempts made so far, counting the first
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_attempts != 0 && self.attempts >= self.max_attempts {
            return None;
        }

        let delay = self.next.min(self.max_delay);
        self.attempts += 1;
        self.next = delay.mul_f64(self.multiplier).min(self.max_delay);
        Some(delay)
    }

    /// Forget previous failures after a successful connection
    pub fn reset(&mut self) {
        self.attempts = 1;
        self.next = self.initial_delay;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_secs(5), 2.0, 3)
    }
}
