//! Resilience patterns for transient failures
//!
//! Generic over the caller's error type: the caller supplies a
//! [`RetryPolicy`] that classifies its own errors, the executor owns the
//! attempt loop and the backoff schedule.

pub mod retry;

pub use retry::{
    BackoffStrategy, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError, RetryExecutor,
    RetryOutcome, RetryPolicy, RetryResult,
};
