//! Per-session bound on master-password guesses.
//!
//! This is a soft deterrent, not a rate limiter: the counter lives only in
//! memory and there is no backoff.

use tracing::debug;

/// Failed unlocks allowed before the unlock flow is torn down.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The caller may prompt again.
    Retry { remaining: u32 },
    /// Threshold reached; the unlock flow must be left.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct UnlockAttempts {
    failures: u32,
    max_attempts: u32,
}

impl UnlockAttempts {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            failures: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.failures)
    }

    pub fn record_failure(&mut self) -> AttemptOutcome {
        self.failures = self.failures.saturating_add(1);
        debug!("Failed unlock attempt {} of {}", self.failures, self.max_attempts);
        if self.failures >= self.max_attempts {
            AttemptOutcome::Exhausted
        } else {
            AttemptOutcome::Retry {
                remaining: self.remaining(),
            }
        }
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

impl Default for UnlockAttempts {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_failures_exhaust() {
        let mut attempts = UnlockAttempts::default();
        assert_eq!(attempts.record_failure(), AttemptOutcome::Retry { remaining: 2 });
        assert_eq!(attempts.record_failure(), AttemptOutcome::Retry { remaining: 1 });
        assert_eq!(attempts.record_failure(), AttemptOutcome::Exhausted);
        assert_eq!(attempts.remaining(), 0);
    }

    #[test]
    fn test_reset_clears_counter() {
        let mut attempts = UnlockAttempts::default();
        attempts.record_failure();
        attempts.record_failure();
        attempts.reset();
        assert_eq!(attempts.failures(), 0);
        assert_eq!(attempts.record_failure(), AttemptOutcome::Retry { remaining: 2 });
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let mut attempts = UnlockAttempts::new(0);
        assert_eq!(attempts.max_attempts(), 1);
        assert_eq!(attempts.record_failure(), AttemptOutcome::Exhausted);
    }
}
