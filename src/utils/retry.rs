use std::future::Future;
use std::time::Duration;

// ============================================================================
// Retry on transient failure
// ============================================================================
//
// Re-runs an operation while its error reports itself as transient, sleeping
// with exponential backoff in between. Permanent errors and the error of the
// last allowed attempt are returned unchanged.
//
// ============================================================================

/// Classifies errors that may succeed when the operation is simply run again.
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total number of runs, the first one included. Zero behaves like one.
    pub max_attempts: u32,
    /// Pause before the second run
    pub initial_delay: Duration,
    /// Upper bound for any single pause
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// One extra run, almost immediately. For lost write races where the
    /// second run is expected to see the winner's row.
    pub fn single_retry() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(5),
            multiplier: 1.0,
        }
    }

    /// Pause after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled.max(0.0))
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of
/// attempts. The closure receives the 1-based attempt number.
pub async fn retry_on_transient<F, Fut, T, E>(config: RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !error.is_transient() || attempt >= attempts {
            if error.is_transient() {
                tracing::warn!(attempt, error = %error, "Giving up after transient failures");
            }
            return Err(error);
        }

        let delay = config.delay_after(attempt);
        tracing::warn!(
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "Transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, PartialEq)]
    enum Outcome {
        Conflict,
        Rejected,
    }

    impl std::fmt::Display for Outcome {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl IsTransient for Outcome {
        fn is_transient(&self) -> bool {
            *self == Outcome::Conflict
        }
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            multiplier: 2.0,
        };
        assert_eq!(config.delay_after(1), Duration::from_millis(100));
        assert_eq!(config.delay_after(2), Duration::from_millis(200));
        assert_eq!(config.delay_after(3), Duration::from_millis(300));
        assert_eq!(config.delay_after(40), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_conflict_then_success() {
        let runs = Cell::new(0);

        let result = retry_on_transient(RetryConfig::single_retry(), |attempt| {
            runs.set(runs.get() + 1);
            async move {
                if attempt == 1 {
                    Err(Outcome::Conflict)
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(runs.get(), 2);
    }

    #[tokio::test]
    async fn test_single_retry_stops_after_two_runs() {
        let runs = Cell::new(0);

        let result: Result<(), _> = retry_on_transient(RetryConfig::single_retry(), |_| {
            runs.set(runs.get() + 1);
            async { Err(Outcome::Conflict) }
        })
        .await;

        assert_eq!(result, Err(Outcome::Conflict));
        assert_eq!(runs.get(), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_returns_immediately() {
        let runs = Cell::new(0);

        let result: Result<(), _> = retry_on_transient(RetryConfig::default(), |_| {
            runs.set(runs.get() + 1);
            async { Err(Outcome::Rejected) }
        })
        .await;

        assert_eq!(result, Err(Outcome::Rejected));
        assert_eq!(runs.get(), 1);
    }
}
