//! Bounded retry with exponential backoff
//!
//! [`RetryExecutor`] runs an async operation, asking a [`RetryPolicy`] after
//! each failure whether another attempt is worthwhile. The policy may accept
//! the configured backoff, request a specific delay (e.g. from a
//! `Retry-After` header), or stop. The last error is always handed back to the
//! caller so it can be classified.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors produced by [`RetryExecutor`]
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every permitted attempt failed with a retryable error
    #[error("all {attempts} attempts failed, last error: {last}")]
    AttemptsExhausted { attempts: u32, last: E },

    /// The policy declined to retry this error
    #[error("operation failed with non-retryable error: {error}")]
    NonRetryable { error: E },

    /// The retry configuration is unusable
    #[error("invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl<E> RetryError<E> {
    /// The error returned by the final attempt, if one was made.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::AttemptsExhausted { last, .. } => Some(last),
            Self::NonRetryable { error } => Some(error),
            Self::InvalidConfiguration { .. } => None,
        }
    }
}

/// Result type for retried operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Outcome of a retried operation together with attempt statistics
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: RetryResult<T, E>,
    pub attempts: u32,
    pub total_delay: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn into_result(self) -> RetryResult<T, E> {
        self.result
    }
}

/// Decides whether a failed attempt should be retried
pub trait RetryPolicy<E> {
    /// `attempt` is zero-based: the first failure is attempt 0.
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

impl<E, F> RetryPolicy<E> for F
where
    F: Fn(&E, u32) -> RetryDecision,
{
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
        self(error, attempt)
    }
}

/// Decision returned by a [`RetryPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the configured backoff delay
    Retry,
    /// Retry after the given delay (still capped by `max_delay`)
    RetryAfter(Duration),
    /// Give up
    Stop,
}

/// Delay schedule between attempts
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    Fixed(Duration),
    /// `initial_delay * multiplier^retry`, capped at `max_delay`
    Exponential { initial_delay: Duration, multiplier: f64, max_delay: Duration },
}

impl BackoffStrategy {
    /// Delay before retry number `retry` (zero-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, multiplier, max_delay } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let millis = initial_delay.as_millis() as f64 * multiplier.powi(exponent);
                let capped = millis.min(max_delay.as_millis() as f64).max(0.0);
                Duration::from_millis(capped as u64)
            }
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    /// Upper bound for any single delay, including policy-provided ones
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_millis(500),
                multiplier: 2.0,
                max_delay: Duration::from_secs(30),
            },
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Validate the configuration, describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if let BackoffStrategy::Exponential { multiplier, .. } = &self.backoff {
            if *multiplier < 1.0 {
                return Err("exponential multiplier must be at least 1.0".to_string());
            }
        }
        Ok(())
    }

    fn delay_for(&self, decision: RetryDecision, retry: u32) -> Option<Duration> {
        let delay = match decision {
            RetryDecision::Retry => self.backoff.delay_for(retry),
            RetryDecision::RetryAfter(delay) => delay,
            RetryDecision::Stop => return None,
        };
        Some(delay.min(self.max_delay))
    }
}

/// Builder for [`RetryConfig`]
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, multiplier, max_delay };
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.config.max_delay = max_delay;
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryError<()>> {
        self.config.validate().map_err(|message| RetryError::InvalidConfiguration { message })?;
        Ok(self.config)
    }
}

/// Runs operations under a [`RetryConfig`] and [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation`, retrying as the policy allows.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute `operation` and report how many attempts it took.
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(message) = self.config.validate() {
            return RetryOutcome {
                result: Err(RetryError::InvalidConfiguration { message }),
                attempts: 0,
                total_delay: Duration::ZERO,
            };
        }

        let mut total_delay = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            let attempt_number = attempt + 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempts = attempt_number, "operation succeeded after retry");
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt_number,
                        total_delay,
                    };
                }
                Err(error) => {
                    let decision = self.policy.should_retry(&error, attempt);
                    let Some(delay) = self.config.delay_for(decision, attempt) else {
                        debug!(attempt = attempt_number, %error, "error is not retryable");
                        return RetryOutcome {
                            result: Err(RetryError::NonRetryable { error }),
                            attempts: attempt_number,
                            total_delay,
                        };
                    };

                    if attempt_number >= self.config.max_attempts {
                        warn!(attempts = attempt_number, %error, "retry attempts exhausted");
                        return RetryOutcome {
                            result: Err(RetryError::AttemptsExhausted {
                                attempts: attempt_number,
                                last: error,
                            }),
                            attempts: attempt_number,
                            total_delay,
                        };
                    }

                    warn!(
                        attempt = attempt_number,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "operation failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    total_delay += delay;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_attempts(max_attempts)
            .fixed_backoff(Duration::from_millis(1))
            .build()
            .unwrap()
    }

    fn always(_: &String, _: u32) -> RetryDecision {
        RetryDecision::Retry
    }

    fn never(_: &String, _: u32) -> RetryDecision {
        RetryDecision::Stop
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let strategy = BackoffStrategy::Exponential {
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(3),
        };
        assert_eq!(strategy.delay_for(0), Duration::from_millis(500));
        assert_eq!(strategy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(strategy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(strategy.delay_for(3), Duration::from_secs(3));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = RetryConfig::builder().max_attempts(0).build().unwrap_err();
        assert!(matches!(err, RetryError::InvalidConfiguration { .. }));
    }

    #[tokio::test]
    async fn invalid_config_fails_without_attempting() {
        let config = RetryConfig { max_attempts: 0, ..RetryConfig::default() };
        let executor = RetryExecutor::new(config, always);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let outcome = executor
            .execute_with_outcome(|| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                }
            })
            .await;

        assert_eq!(outcome.attempts, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        match outcome.result {
            Err(RetryError::InvalidConfiguration { message }) => {
                assert!(message.contains("max_attempts"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn policy_delay_is_capped_by_max_delay() {
        let config = RetryConfig { max_delay: Duration::from_secs(2), ..RetryConfig::default() };
        let delay = config.delay_for(RetryDecision::RetryAfter(Duration::from_secs(600)), 0);
        assert_eq!(delay, Some(Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(fast(3), always);

        let counter = Arc::clone(&calls);
        let outcome = executor
            .execute_with_outcome(|| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("boom".to_string())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_return_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(fast(3), always);

        let counter = Arc::clone(&calls);
        let result: RetryResult<(), String> = executor
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    Err(format!("failure {n}"))
                }
            })
            .await;

        match result {
            Err(RetryError::AttemptsExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "failure 2");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(fast(5), never);

        let counter = Arc::clone(&calls);
        let result: RetryResult<(), String> = executor
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("bad request".to_string())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().into_last_error().as_deref(), Some("bad request"));
    }

    #[tokio::test]
    async fn retry_after_decision_is_honoured() {
        let executor = RetryExecutor::new(fast(2), |_: &String, _: u32| {
            RetryDecision::RetryAfter(Duration::from_millis(5))
        });

        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let outcome = executor
            .execute_with_outcome(|| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("429".to_string())
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.total_delay, Duration::from_millis(5));
    }
}
