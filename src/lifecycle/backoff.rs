//! Exponential backoff between reconnect attempts

use std::time::Duration;

use crate::config::RetryPolicy;

/// Doubling delay, capped at the policy maximum
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    current: Duration,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            current: policy.initial,
        }
    }

    /// Delay to wait before the next attempt; grows the following one
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.policy.max);
        delay
    }

    /// Call after a successful connection
    pub fn reset(&mut self) {
        self.current = self.policy.initial;
    }
}
