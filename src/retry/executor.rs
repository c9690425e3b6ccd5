//! Generic retry executor
//!
//! [`with_retry`] runs an async operation, classifies each failure via
//! [`classify`](super::classify), and re-invokes the operation after a
//! backoff delay until it succeeds, the failure is fatal, or the retry
//! bound is reached. The final error is propagated unchanged -- callers
//! cannot distinguish a fatal error from an exhausted-retry error except
//! that the latter preserves the original error rather than a wrapper.
//!
//! Per-retry state lives in an explicit [`Attempt`] value scoped to one
//! executor invocation; nothing is shared across calls.

use std::future::Future;

use crate::error::Result;
use crate::retry::backoff::{delay_for_attempt, RetryPolicy};
use crate::retry::classify::{classify, FailureClass};

/// Environment toggle for per-retry diagnostic lines on stderr.
///
/// When unset (or set to a non-truthy value) the executor is silent on
/// stderr. Diagnostics never affect control flow.
pub const RETRY_LOG_ENV: &str = "TOOLSCOPE_RETRY_LOG";

/// Transient state for a single [`with_retry`] invocation.
///
/// Discarded on success or final failure.
#[derive(Debug, Default)]
pub struct Attempt {
    /// Number of retries performed so far (zero before the first retry).
    pub index: u32,
    /// Message of the most recent observed error.
    pub last_error: Option<String>,
}

impl Attempt {
    fn record(&mut self, error: &anyhow::Error) {
        self.last_error = Some(format!("{error:#}"));
        self.index += 1;
    }
}

/// Run `operation`, retrying transient failures per `policy`.
///
/// The initial execution is attempt zero; on a transient failure the
/// executor suspends for [`delay_for_attempt`] (which yields only the
/// calling task) and re-invokes the operation, up to
/// `policy.max_retries` retries. Fatal failures and the final failure
/// after exhaustion propagate the underlying error unchanged.
///
/// # Arguments
///
/// * `label` - Short operation name used in diagnostics (e.g. `"connect"`).
/// * `policy` - The retry policy to apply.
/// * `operation` - Closure producing a fresh future per attempt.
///
/// # Examples
///
/// ```
/// use toolscope::retry::{with_retry, RetryPolicy};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let value = with_retry("demo", &RetryPolicy::no_retries(), || async { Ok(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn with_retry<T, F, Fut>(label: &str, policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = Attempt::default();

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt.index >= policy.max_retries
                    || classify(&error) == FailureClass::Fatal
                {
                    return Err(error);
                }

                let delay = delay_for_attempt(attempt.index, policy);
                attempt.record(&error);
                emit_retry_diagnostic(label, &attempt, policy, delay.as_millis());

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Emit one observability line for a retry.
///
/// Always traces at debug level; additionally writes to stderr when the
/// [`RETRY_LOG_ENV`] toggle is truthy.
fn emit_retry_diagnostic(label: &str, attempt: &Attempt, policy: &RetryPolicy, delay_ms: u128) {
    let error = attempt.last_error.as_deref().unwrap_or("(unknown)");

    tracing::debug!(
        target: "toolscope::retry",
        "retrying {label}: attempt {}/{} in {delay_ms}ms after error: {error}",
        attempt.index,
        policy.max_retries,
    );

    if retry_log_enabled() {
        eprintln!(
            "toolscope: retrying {label} (attempt {}/{}, waiting {delay_ms}ms): {error}",
            attempt.index, policy.max_retries,
        );
    }
}

fn retry_log_enabled() -> bool {
    matches!(
        std::env::var(RETRY_LOG_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}
