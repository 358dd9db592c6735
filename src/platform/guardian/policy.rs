use crate::config::RestartConfig;
use std::time::Duration;

/// Capped exponential restart schedule for one guarded process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    RestartAfter(Duration),
    Exhausted,
}

impl RestartPolicy {
    pub fn from_config(config: &RestartConfig) -> Self {
        let backoff_base = Duration::from_secs(config.backoff_base_secs.max(1));
        Self {
            max_retries: config.max_retries,
            backoff_base,
            backoff_cap: Duration::from_secs(config.backoff_cap_secs).max(backoff_base),
        }
    }

    /// `min(base * 2^(failures-1), cap)`; the first failure waits `base`.
    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1).min(31);
        self.backoff_base
            .checked_mul(1_u32 << exponent)
            .map_or(self.backoff_cap, |delay| delay.min(self.backoff_cap))
    }

    pub fn decide(&self, consecutive_failures: u32) -> RestartDecision {
        if consecutive_failures > self.max_retries {
            RestartDecision::Exhausted
        } else {
            RestartDecision::RestartAfter(self.delay(consecutive_failures))
        }
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::from_config(&RestartConfig::default())
    }
}
