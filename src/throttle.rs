//! Epoch-based token bucket used to budget calls to each backend.
//!
//! Epochs are anchored to the first check after the previous one expired,
//! not slid per call. Unused tokens never carry over: however many epochs
//! went by unobserved, a rollover simply starts one fresh epoch at "now".
//!
//! Time comes from [`tokio::time::Instant`] so tests can freeze and advance
//! the clock with `tokio::time::pause`/`advance`.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::ThrottleConfig;

#[derive(Debug, Clone)]
pub struct Throttler {
    epoch_interval: Duration,
    tokens_per_epoch: u32,
    tokens: u32,
    epoch_start: Instant,
    /// Usually `epoch_start + epoch_interval`; pushed out by advisory back-off.
    epoch_end: Instant,
}

impl Throttler {
    pub fn new(epoch_interval: Duration, tokens_per_epoch: u32) -> Self {
        let now = Instant::now();
        Self {
            epoch_interval,
            tokens_per_epoch,
            tokens: 0,
            epoch_start: now,
            epoch_end: now + epoch_interval,
        }
    }

    pub fn from_config(config: &ThrottleConfig) -> Self {
        Self::new(config.epoch_interval(), config.tokens_per_epoch)
    }

    pub fn epoch_interval(&self) -> Duration {
        self.epoch_interval
    }

    pub fn tokens_per_epoch(&self) -> u32 {
        self.tokens_per_epoch
    }

    /// Tokens consumed in the current epoch.
    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    pub fn epoch_start(&self) -> Instant {
        self.epoch_start
    }

    /// Whether `n` more tokens fit in the current epoch.
    pub fn check(&mut self, n: u32) -> bool {
        self.roll_epoch();
        self.tokens.saturating_add(n) <= self.tokens_per_epoch
    }

    /// Consumes `n` tokens without checking capacity.
    pub fn mark(&mut self, n: u32) {
        self.tokens = self.tokens.saturating_add(n);
    }

    /// Changes capacity in place; the running epoch keeps its count.
    pub fn set_tokens_per_epoch(&mut self, tokens_per_epoch: u32) {
        self.tokens_per_epoch = tokens_per_epoch;
    }

    /// Grows capacity to at least `min`. Growth wipes the consumed count
    /// but keeps the epoch boundary, so advisory back-off still applies.
    pub fn raise_capacity(&mut self, min: u32) -> bool {
        if min <= self.tokens_per_epoch {
            return false;
        }
        self.tokens_per_epoch = min;
        self.tokens = 0;
        true
    }

    /// Holds the current epoch open until `issued_at + advisory` when the
    /// advisory is longer than the configured interval.
    pub fn defer_epoch(&mut self, issued_at: Instant, advisory: Duration) -> bool {
        if advisory <= self.epoch_interval {
            return false;
        }
        let until = issued_at + advisory;
        if until <= self.epoch_end {
            return false;
        }
        self.epoch_end = until;
        true
    }

    /// Starts a fresh epoch now with nothing consumed.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.tokens = 0;
        self.epoch_start = now;
        self.epoch_end = now + self.epoch_interval;
    }

    fn roll_epoch(&mut self) {
        if Instant::now() >= self.epoch_end {
            self.reset();
        }
    }
}
