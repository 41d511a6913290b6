use tokio::time::Duration;

/// Matches the greeting protocol's historical behaviour: 100 attempts, 100ms apart.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// How the wait between two dial attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Wait `interval` after every failed attempt.
    Fixed,
    /// Wait `interval * n` after the `n`th failed attempt.
    Linear,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed
    }
}

/// The `RetryPolicy` bounds how long a dialer keeps trying to reach a peer which is not
/// listening yet. Once `max_attempts` connection attempts have failed the peer is declared
/// unreachable, which is fatal for the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration, backoff: Backoff) -> Self {
        RetryPolicy { max_attempts, interval, backoff }
    }

    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        RetryPolicy::new(max_attempts, interval, Backoff::Fixed)
    }

    pub fn linear(max_attempts: u32, interval: Duration) -> Self {
        RetryPolicy::new(max_attempts, interval, Backoff::Linear)
    }

    /// The wait after the failed attempt number `attempt` (starting at 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Linear => self.interval.checked_mul(attempt.max(1)).unwrap_or(Duration::MAX),
        }
    }

    /// Total time spent sleeping before the last attempt is made.
    pub fn budget(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.delay(attempt))
            .fold(Duration::ZERO, |total, delay| total.saturating_add(delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::fixed(DEFAULT_MAX_ATTEMPTS, DEFAULT_INTERVAL)
    }
}
