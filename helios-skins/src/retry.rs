use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// Retries after the first attempt before giving up.
    pub(crate) max_retries: u8,
    /// First retry delay that is then used to calculate the exponential backoff.
    /// Example: 200ms first, then 400ms, 800ms and so on.
    pub(crate) initial_retry_delay: Duration,
    /// Cap on the retry delay so the exponential backoff doesn't get out of hand.
    pub(crate) max_retry_delay: Duration,
}

impl RetrySettings {
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay: Duration::from_millis(200),
            max_retry_delay: Duration::from_millis(2_000),
        }
    }

    /// Maximum number of retries after the first failed attempt.
    pub fn max_retries(&mut self, max_retries: u8) -> &mut Self {
        self.max_retries = max_retries;
        self
    }

    /// Maximum duration the refresh exponentially backs off until it tries again.
    pub fn max_retry_delay(&mut self, duration: Duration) -> &mut Self {
        self.max_retry_delay = duration;
        self
    }

    /// Minimum duration the refresh exponentially backs off until it tries again.
    pub fn initial_retry_delay(&mut self, duration: Duration) -> &mut Self {
        self.initial_retry_delay = duration;
        self
    }

    /// Exponential backoff delay starting with `initial_retry_delay` and maxing out at `max_retry_delay`.
    pub fn retry_delay(&self, retry_count: u8) -> Duration {
        let initial_ms = self.initial_retry_delay.as_millis() as u64;
        let multiplicator = 2u64.saturating_pow(retry_count as u32);
        let delay = Duration::from_millis(initial_ms.saturating_mul(multiplicator));
        delay.min(self.max_retry_delay)
    }

    /// Total number of upstream calls a single refresh may make.
    pub fn max_attempts(&self) -> usize {
        self.max_retries as usize + 1
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::new()
    }
}
