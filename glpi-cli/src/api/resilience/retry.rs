//! Bounded retry policy with capped backoff
//!
//! The duplicate-recovery path of the resolver can race a search index
//! that has not yet caught up with a concurrent creation. Instead of
//! inline sleep-and-reread loops, the number of rounds and the pause
//! between them are an explicit parameter threaded through the run
//! context.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total recovery rounds, including the first immediate one
    pub max_attempts: u32,
    /// Pause before the second round
    pub base_delay: Duration,
    /// Ceiling for the backoff growth
    pub max_delay: Duration,
    /// Growth factor between rounds
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Fewer rounds, longer pauses; for servers known to index slowly.
    pub fn conservative() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// Single round, no pauses (used by tests).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay before the given attempt (attempt 0 never waits).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.powi(attempt as i32 - 1);
        let delay = self.base_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }

    /// Sleep for the attempt's delay.
    pub async fn pause(&self, attempt: u32) {
        let delay = self.delay_for(attempt);
        if !delay.is_zero() {
            log::debug!("retry round {attempt}: pausing {delay:?}");
            tokio::time::sleep(delay).await;
        }
    }
}
