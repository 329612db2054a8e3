//! How long to wait before trying again when the pool
//! has nothing to give.

use std::time::Duration;

/// Exponential backoff: 500ms, 1s, 2s, ... up to 512s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Backoff {
    attempt: u32,
}

impl Backoff {
    /// Attempts past this one wait the same amount of time.
    pub const MAX_ATTEMPT: u32 = 10;

    pub fn new() -> Self {
        Self::default()
    }

    /// Delay for the given attempt (0-indexed).
    pub fn delay(attempt: u32) -> Duration {
        // 1000 * (2^n / 2)
        Duration::from_millis(500 << attempt.min(Self::MAX_ATTEMPT))
    }

    /// Delay for the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = Self::delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
