use std::time::Duration;

use rand::Rng;

/// Bounded exponential backoff shared by token refresh and resource calls.
///
/// `max_attempts` counts every attempt including the first one, so a policy
/// with `max_attempts == 1` never retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    pub retryable_statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            jitter: true,
            retryable_statuses: std::iter::once(429).chain(500..600).collect(),
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Whether another attempt is allowed after `attempt` attempts have failed.
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay after the `attempt`-th failure (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let raw = self
            .base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay);
        let capped = raw.min(self.max_delay);
        if !self.jitter {
            return capped;
        }

        // Equal jitter: half fixed, half random.
        let millis = capped.as_millis() as u64;
        let half = millis / 2;
        if half == 0 {
            return capped;
        }
        let spread = rand::rng().random_range(0..=half);
        Duration::from_millis(half + spread)
    }

    /// Upstream `Retry-After` wins over computed backoff, but never beyond `max_delay`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => self.backoff(attempt),
        }
    }
}

/// Parses a `Retry-After` header value given either as delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let when = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let remaining = when.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(remaining.to_std().unwrap_or(Duration::ZERO))
}
