//! Retry policies for calendar and OAuth failures
//!
//! Plugs the domain error taxonomy into the generic executor from
//! `calsync-common`.

use std::time::Duration;

use calsync_common::resilience::{BackoffStrategy, RetryConfig, RetryDecision, RetryPolicy};
use calsync_domain::{RefreshError, RemoteError};

/// Retries transient and rate-limited calendar calls, honouring
/// `Retry-After` when the server sent one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteRetryPolicy;

impl RetryPolicy<RemoteError> for RemoteRetryPolicy {
    fn should_retry(&self, error: &RemoteError, _attempt: u32) -> RetryDecision {
        if !error.is_transient() {
            return RetryDecision::Stop;
        }
        match error.retry_after() {
            Some(delay) => RetryDecision::RetryAfter(delay),
            None => RetryDecision::Retry,
        }
    }
}

/// Retries only transient token endpoint failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshRetryPolicy;

impl RetryPolicy<RefreshError> for RefreshRetryPolicy {
    fn should_retry(&self, error: &RefreshError, _attempt: u32) -> RetryDecision {
        if error.is_transient() {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Backoff for remote calendar calls: `retries` extra attempts, doubling
/// from `initial_backoff`, 30s per-step cap and a 60s cap on server hints.
pub fn remote_retry_config(retries: u32, initial_backoff: Duration) -> RetryConfig {
    RetryConfig {
        max_attempts: retries.saturating_add(1),
        backoff: BackoffStrategy::Exponential {
            initial_delay: initial_backoff,
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        },
        max_delay: Duration::from_secs(60),
    }
}

/// Backoff for the refresh grant: two immediate retries starting at 200ms.
pub fn refresh_retry_config() -> RetryConfig {
    remote_retry_config(2, Duration::from_millis(200))
}
