//! Retry policy for transient transport failures
//!
//! Every wire operation toolscope performs (connect handshake, tool
//! discovery, tool invocation) is wrapped in [`with_retry`], which
//! classifies failures via [`classify`], schedules delays via
//! [`delay_for_attempt`], and re-invokes the operation up to a bound.
//!
//! # Module Layout
//!
//! - `classify` -- transient-vs-fatal error classification
//! - `backoff`  -- [`RetryPolicy`] and exponential-with-jitter delays
//! - `executor` -- the generic [`with_retry`] wrapper and [`Attempt`] state

pub mod backoff;
pub mod classify;
pub mod executor;

pub use backoff::{delay_for_attempt, RetryPolicy};
pub use classify::{classify, FailureClass};
pub use executor::{with_retry, Attempt};
