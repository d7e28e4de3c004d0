//! Deadline guard for upstream calls.
//!
//! [`race`] polls the operation against a timer; whichever resolves first
//! decides the outcome. On expiry the operation future is dropped, which
//! cancels an in-flight `reqwest` request at its next await point. Work the
//! operation already handed to other tasks (spawned futures, blocking
//! threads) is NOT cancelled: it runs to completion in the background and its
//! result is discarded. Callers must not rely on expiry freeing upstream
//! resources, only on regaining control within the budget.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The deadline fired before the operation completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {}ms exceeded", .budget.as_millis())]
pub struct TimeoutError {
    /// The budget that elapsed
    pub budget: Duration,
}

impl TimeoutError {
    pub fn budget_ms(&self) -> u64 {
        self.budget.as_millis() as u64
    }
}

/// Run `operation` with a deadline.
pub async fn race<F>(operation: F, deadline: Duration) -> Result<F::Output, TimeoutError>
where
    F: Future,
{
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| TimeoutError { budget: deadline })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operation_wins() {
        let result = race(async { 42 }, Duration::from_millis(200)).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_deadline_wins() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            42
        };
        let started = std::time::Instant::now();
        let result = race(slow, Duration::from_millis(50)).await;

        assert_eq!(
            result,
            Err(TimeoutError {
                budget: Duration::from_millis(50)
            })
        );
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_timeout_error_display() {
        let error = TimeoutError {
            budget: Duration::from_millis(1500),
        };
        assert_eq!(error.to_string(), "deadline of 1500ms exceeded");
        assert_eq!(error.budget_ms(), 1500);
    }
}
