// Bounded retry for long-poll failures.

use std::time::Duration;

use crate::config::SubscriptionConfig;

/// Tracks consecutive transient poll failures for one subscription.
#[derive(Debug)]
pub(super) struct PollRetry {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    failures: u32,
}

impl PollRetry {
    pub(super) fn new(config: &SubscriptionConfig) -> Self {
        Self {
            max_retries: config.max_poll_retries,
            initial_delay: config.retry_delay,
            max_delay: config.max_retry_delay,
            failures: 0,
        }
    }

    /// A poll succeeded; the next failure starts from the initial delay.
    pub(super) fn reset(&mut self) {
        self.failures = 0;
    }

    /// Delay before retrying after a failure, or `None` once it is terminal.
    pub(super) fn next_delay(&mut self, transient: bool) -> Option<Duration> {
        if !transient || self.failures >= self.max_retries {
            return None;
        }
        let delay = calculate_backoff(self.failures, self.initial_delay, self.max_delay);
        self.failures += 1;
        Some(delay)
    }

    pub(super) fn failures(&self) -> u32 {
        self.failures
    }
}

/// `delay = min(initial * 2^attempt, max)`
fn calculate_backoff(attempt: u32, initial: Duration, max: Duration) -> Duration {
    initial
        .saturating_mul(2_u32.saturating_pow(attempt))
        .min(max)
}
