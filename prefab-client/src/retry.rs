//! Retry policy for snapshot fetches.

use crate::error::ClientError;
use std::time::Duration;

/// Retry policy applied to each config service URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per URL, including the first.
    pub max_attempts: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Maximum total time spent retrying one URL.
    pub max_retry_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(500))
    }
}

impl RetryConfig {
    /// Exponential backoff doubling from `initial_delay`, capped at 10s.
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self::with_backoff(
            max_attempts,
            BackoffStrategy::Exponential {
                initial: initial_delay,
                max: Duration::from_secs(10),
                multiplier: 2.0,
            },
        )
    }

    /// Linear backoff growing by `delay` per attempt, capped at 10s.
    pub fn linear(max_attempts: u32, delay: Duration) -> Self {
        Self::with_backoff(
            max_attempts,
            BackoffStrategy::Linear {
                delay,
                max: Duration::from_secs(10),
            },
        )
    }

    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self::with_backoff(max_attempts, BackoffStrategy::Constant(delay))
    }

    /// Retry without waiting. Mostly useful in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::with_backoff(max_attempts, BackoffStrategy::None)
    }

    fn with_backoff(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            max_retry_time: Some(Duration::from_secs(60)),
        }
    }

    /// Delay before retry number `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay_for_attempt(attempt.saturating_sub(1))
    }

    /// Whether a failed attempt (0-indexed) may be followed by another.
    pub fn should_retry(&self, attempt: u32, error: &ClientError) -> bool {
        attempt + 1 < self.max_attempts && error.is_retryable()
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Constant delay between retries.
    Constant(Duration),
    /// Delay grows by a fixed amount each attempt.
    Linear {
        /// Delay increment per attempt.
        delay: Duration,
        /// Maximum delay.
        max: Duration,
    },
    /// Delay is multiplied each attempt.
    Exponential {
        /// Initial delay.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier (typically 2.0).
        multiplier: f64,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Constant(d) => *d,
            Self::Linear { delay, max } => delay.saturating_mul(attempt + 1).min(*max),
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let factor = multiplier.powi(attempt.min(i32::MAX as u32) as i32);
                let millis = (initial.as_millis() as f64 * factor).min(max.as_millis() as f64);
                Duration::from_millis(millis as u64).min(*max)
            }
        }
    }
}
