//! Exponential backoff with jitter
//!
//! Delay for retry attempt `n` (zero-based) is
//! `min(base * 2^n, cap)` with symmetric ±25% uniform jitter applied,
//! rounded to the nearest millisecond. With the default policy
//! (3 retries, 1s base, 10s cap) cumulative backoff is roughly
//! 1s + 2s + 4s before jitter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Immutable retry configuration.
///
/// Constructed once per operation class and never mutated. Connect,
/// discovery, and invocation share the same default unless the
/// configuration overrides it.
///
/// # Examples
///
/// ```
/// use toolscope::retry::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_retries, 3);
/// assert_eq!(policy.base_delay_ms, 1000);
/// assert_eq!(policy.max_delay_ms, 10_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for the first retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on any single delay, in milliseconds (before jitter).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries. Useful in tests and for callers that
    /// want a single attempt with uniform error handling.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Compute the backoff delay for a zero-based retry attempt.
///
/// The first retry after the initial failed attempt uses `attempt = 0`.
/// The exponential term is capped at `policy.max_delay_ms` before jitter,
/// so the result never exceeds `max_delay_ms * 1.25`.
///
/// # Examples
///
/// ```
/// use toolscope::retry::{delay_for_attempt, RetryPolicy};
///
/// let policy = RetryPolicy::default();
/// let delay = delay_for_attempt(0, &policy);
/// // 1000ms +/- 25%
/// assert!(delay.as_millis() >= 750 && delay.as_millis() <= 1250);
/// ```
pub fn delay_for_attempt(attempt: u32, policy: &RetryPolicy) -> Duration {
    use rand::Rng;

    let exponential = (policy.base_delay_ms as f64) * 2f64.powi(attempt.min(62) as i32);
    let capped = exponential.min(policy.max_delay_ms as f64);

    // Symmetric jitter of +/-25%, uniform.
    let jitter: f64 = rand::rng().random_range(-0.25..=0.25);
    let jittered = capped * (1.0 + jitter);

    Duration::from_millis(jittered.round().max(0.0) as u64)
}
