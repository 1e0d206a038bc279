use std::time::Duration;

/// Default retry budget: 2 retries, i.e. 3 total attempts per chunk.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Default fixed backoff between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// A failed chunk upload, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("server returned status {0}")]
    Status(u16),
}

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Retryable,
    Permanent,
}

impl UploadError {
    /// Classifies the failure.
    ///
    /// Retryable: network loss, timeout, and the "try again later"
    /// statuses — 409 (server still waiting on missing chunks), 429 and
    /// 503. Everything else is permanent.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Network(_) | Self::Timeout => FailureClass::Retryable,
            Self::Status(409 | 429 | 503) => FailureClass::Retryable,
            Self::Status(_) => FailureClass::Permanent,
        }
    }
}

/// What to do with a chunk that just failed transiently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue the chunk after this delay.
    RetryAfter(Duration),
    /// Retry budget spent; the file fails with `RetriesExhausted`.
    GiveUp,
}

/// Bounded fixed-delay retry policy, applied per chunk independently.
///
/// The delay never blocks other tasks; the scheduler arms a timer for
/// the failed chunk and keeps dispatching everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Decides the fate of a chunk that has already spent
    /// `prior_retries` retries and just failed again.
    pub fn next_attempt(&self, prior_retries: u32) -> RetryDecision {
        if prior_retries < self.max_attempts {
            RetryDecision::RetryAfter(self.delay)
        } else {
            RetryDecision::GiveUp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_and_timeout_are_retryable() {
        assert_eq!(
            UploadError::Network("connection reset".into()).class(),
            FailureClass::Retryable
        );
        assert_eq!(UploadError::Timeout.class(), FailureClass::Retryable);
    }

    #[test]
    fn busy_statuses_are_retryable() {
        for status in [409, 429, 503] {
            assert_eq!(
                UploadError::Status(status).class(),
                FailureClass::Retryable,
                "status {status}"
            );
        }
    }

    #[test]
    fn other_statuses_are_permanent() {
        for status in [400, 403, 404, 413, 500, 502] {
            assert_eq!(
                UploadError::Status(status).class(),
                FailureClass::Permanent,
                "status {status}"
            );
        }
    }

    #[test]
    fn default_budget_allows_two_retries() {
        let policy = RetryPolicy::default();
        // 1st failure: 0 retries spent so far.
        assert_eq!(
            policy.next_attempt(0),
            RetryDecision::RetryAfter(DEFAULT_RETRY_DELAY)
        );
        // 2nd failure.
        assert_eq!(
            policy.next_attempt(1),
            RetryDecision::RetryAfter(DEFAULT_RETRY_DELAY)
        );
        // 3rd failure: budget spent.
        assert_eq!(policy.next_attempt(2), RetryDecision::GiveUp);
    }

    #[test]
    fn zero_budget_gives_up_immediately() {
        let policy = RetryPolicy {
            max_attempts: 0,
            delay: Duration::from_millis(10),
        };
        assert_eq!(policy.next_attempt(0), RetryDecision::GiveUp);
    }
}
