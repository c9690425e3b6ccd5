//! Transient-vs-fatal failure classification
//!
//! Transport and protocol errors arrive from collaborators whose error
//! shapes this crate does not control (reqwest, tokio process spawning,
//! remote JSON-RPC servers), so classification is a case-insensitive
//! substring heuristic over the rendered error chain rather than a typed
//! inspection. The matching is deliberately broad: retrying a
//! non-retryable error occasionally is cheaper than missing a transient
//! condition.

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Expected to possibly succeed if retried (network/timeout/overload).
    Transient,
    /// Retrying will not help (configuration, auth, protocol violations).
    Fatal,
}

/// Substrings whose presence (case-insensitive) marks an error transient.
///
/// HTTP status markers cover rate limiting (429) and upstream overload
/// (502, 503, 504).
const TRANSIENT_MARKERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "timed out",
    "timeout",
    "host not found",
    "dns",
    "broken pipe",
    "network",
    "connection",
    "429",
    "502",
    "503",
    "504",
];

/// Classify an error as transient or fatal.
///
/// The full `anyhow` chain is rendered (alternate format includes every
/// cause) so markers buried in a source error are still seen.
///
/// # Examples
///
/// ```
/// use toolscope::retry::{classify, FailureClass};
///
/// let err = anyhow::anyhow!("Connection refused (os error 111)");
/// assert_eq!(classify(&err), FailureClass::Transient);
///
/// let err = anyhow::anyhow!("Authentication failed");
/// assert_eq!(classify(&err), FailureClass::Fatal);
/// ```
pub fn classify(error: &anyhow::Error) -> FailureClass {
    let message = format!("{error:#}").to_lowercase();
    if TRANSIENT_MARKERS.iter().any(|m| message.contains(m)) {
        FailureClass::Transient
    } else {
        FailureClass::Fatal
    }
}
