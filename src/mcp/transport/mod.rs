//! MCP transport abstraction, factory, and implementations
//!
//! The [`Transport`] trait is intentionally minimal: callers `send` a
//! serialized JSON-RPC string and `receive` a stream of serialized
//! JSON-RPC strings (one per logical message). Framing and session
//! mechanics are the responsibility of each implementation:
//!
//! - [`stdio::StdioTransport`] -- spawns a child process and communicates
//!   over its stdin/stdout pipes (newline-delimited JSON).
//! - [`http::HttpTransport`] -- streamable HTTP: every message is an HTTP
//!   POST; responses arrive as direct JSON bodies or SSE streams.
//! - [`fake::FakeTransport`] -- in-process fake used in tests.
//!
//! The `receive_err` stream carries transport-level diagnostics (e.g.
//! stderr output from a child process); diagnostic output is never an
//! error condition.
//!
//! [`build`] selects the implementation from a validated
//! [`ServerDescriptor`]. For the stdio variant, construction spawns the
//! child process -- real I/O -- so callers run `build` inside the retry
//! executor as the first step of connecting. The ambient process
//! environment is passed in explicitly rather than read from global
//! state, keeping the factory deterministic under test.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;

use crate::config::ServerDescriptor;
use crate::error::Result;

/// Abstraction over MCP transport implementations.
///
/// All methods are `async` or return pinned [`Stream`]s so that
/// implementations can drive I/O without blocking the Tokio executor.
/// Used polymorphically through `Arc<dyn Transport>`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send a complete JSON-RPC message string to the remote peer.
    ///
    /// The string MUST be a single, complete JSON object. The transport
    /// applies any framing the medium requires (newline for stdio, HTTP
    /// POST for the streamable transport).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ToolscopeError::Transport`] if the
    /// underlying I/O operation fails.
    async fn send(&self, message: String) -> Result<()>;

    /// Returns a stream of inbound JSON-RPC message strings.
    ///
    /// Each item is a single, complete JSON object with surrounding
    /// whitespace stripped. The stream ends when the transport is closed
    /// or the remote peer disconnects.
    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>>;

    /// Returns a stream of transport-level diagnostic strings.
    ///
    /// For stdio transports this carries the child's stderr lines; for
    /// HTTP transports it may be empty. Diagnostics are informational
    /// only.
    fn receive_err(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>>;
}

/// Construct a transport for a validated server descriptor.
///
/// For [`ServerDescriptor::Stdio`] this spawns the child process with an
/// environment built from `ambient_env` overlaid with the descriptor's
/// entries (descriptor wins on collisions) -- spawning is part of the
/// connect step and is retried by the caller. For
/// [`ServerDescriptor::Http`] no network I/O happens here; the
/// descriptor's `timeout_ms` overrides `default_timeout` when present.
///
/// # Errors
///
/// Returns [`crate::error::ToolscopeError::Transport`] if a child
/// process cannot be spawned.
pub fn build(
    descriptor: &ServerDescriptor,
    ambient_env: &HashMap<String, String>,
    default_timeout: Duration,
) -> Result<Arc<dyn Transport>> {
    match descriptor {
        ServerDescriptor::Stdio {
            command,
            args,
            env,
            cwd,
        } => {
            let merged = merged_environment(ambient_env, env);
            let transport =
                stdio::StdioTransport::spawn(command.clone(), args.clone(), merged, cwd.clone())?;
            Ok(Arc::new(transport))
        }
        ServerDescriptor::Http {
            url,
            headers,
            timeout_ms,
        } => {
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(default_timeout);
            let transport = http::HttpTransport::new(url.clone(), headers.clone(), timeout);
            Ok(Arc::new(transport))
        }
    }
}

/// Merge the descriptor's environment overlay over the ambient
/// environment. Overlay entries win on key collision.
pub(crate) fn merged_environment(
    ambient: &HashMap<String, String>,
    overlay: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = ambient.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

pub mod http;
pub mod stdio;

#[cfg(test)]
pub mod fake;
