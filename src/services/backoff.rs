//! Exponential backoff shared by every fetch loop.
//!
//! [`next`] is the pure policy. [`RetryState`] is the per-loop counter that
//! applies it: it sleeps between attempts and turns an exhausted budget
//! into [`AppError::RetriesExhausted`].

use std::time::Duration;

use crate::error::{AppError, Result};

/// Upper bound on a single wait.
pub const MAX_WAIT_SECS: u64 = 600;

/// Compute the wait before the next attempt and the new attempt count.
///
/// The wait is `min(2^new_attempt_count, 600)` seconds. Once the new count
/// reaches `max_attempts` the budget is spent: the wait is zero and the
/// caller must stop instead of retrying.
pub fn next(attempt_count: u32, max_attempts: u32) -> (Duration, u32) {
    let attempts = attempt_count.saturating_add(1);
    if is_exhausted(attempts, max_attempts) {
        return (Duration::ZERO, attempts);
    }
    let secs = 1u64
        .checked_shl(attempts)
        .unwrap_or(u64::MAX)
        .min(MAX_WAIT_SECS);
    (Duration::from_secs(secs), attempts)
}

/// Whether `attempt_count` has used up the budget.
pub fn is_exhausted(attempt_count: u32, max_attempts: u32) -> bool {
    attempt_count >= max_attempts
}

/// Retry counter owned by a single fetch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forget earlier failures after a successful response.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Record a failed attempt and wait before the caller retries.
    ///
    /// Fails without sleeping when the attempt budget is used up.
    pub async fn back_off(&mut self, max_attempts: u32, context: &str, reason: &str) -> Result<()> {
        let (wait, attempts) = next(self.attempts, max_attempts);
        self.attempts = attempts;

        if is_exhausted(attempts, max_attempts) {
            log::error!("Max retries reached for {context} ({reason})");
            return Err(AppError::RetriesExhausted {
                context: context.to_string(),
                attempts,
                reason: reason.to_string(),
            });
        }

        log::warn!(
            "{reason} on {context}. Waiting {} seconds (attempt {attempts}/{max_attempts})",
            wait.as_secs()
        );
        tokio::time::sleep(wait).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_retry_waits_two_seconds() {
        assert_eq!(next(0, 20), (Duration::from_secs(2), 1));
    }

    #[test]
    fn test_wait_is_capped() {
        assert_eq!(next(9, 20), (Duration::from_secs(600), 10));
        assert_eq!(next(70, 100), (Duration::from_secs(600), 71));
    }

    #[test]
    fn test_count_is_monotonic() {
        let mut previous = 0;
        for count in 0..40 {
            let (wait, attempts) = next(count, 100);
            assert_eq!(attempts, count + 1);
            assert!(wait.as_secs() >= previous);
            previous = wait.as_secs();
        }
    }

    #[test]
    fn test_no_wait_once_exhausted() {
        assert_eq!(next(19, 20), (Duration::ZERO, 20));
        assert_eq!(next(0, 1), (Duration::ZERO, 1));
    }

    #[test]
    fn test_is_exhausted() {
        assert!(!is_exhausted(19, 20));
        assert!(is_exhausted(20, 20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_off_sleeps_then_exhausts() {
        let mut retry = RetryState::default();
        let start = tokio::time::Instant::now();

        retry.back_off(3, "users page 0", "rate limited").await.unwrap();
        retry.back_off(3, "users page 0", "rate limited").await.unwrap();
        assert_eq!(retry.attempts(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(2 + 4));

        let err = retry
            .back_off(3, "users page 0", "rate limited")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(6));

        retry.reset();
        assert_eq!(retry.attempts(), 0);
    }
}
