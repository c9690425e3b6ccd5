//! Streamable HTTP transport for remote MCP servers
//!
//! [`HttpTransport`] sends every outbound JSON-RPC message as an HTTP
//! POST. The server may reply with:
//!
//! - `application/json` -- a direct JSON response body
//! - `text/event-stream` -- an SSE stream carrying one or more JSON-RPC
//!   messages
//! - `202 Accepted` -- an acknowledgement with no body (used for
//!   notifications)
//!
//! # Session management
//!
//! After a successful `initialize` POST the server MAY return an
//! `MCP-Session-Id` response header. When present, this value is stored
//! and attached to every subsequent POST. If the server returns `404`
//! while a session is active, the session is cleared and an error is
//! returned.
//!
//! # Drop behaviour
//!
//! When the transport is dropped and a session ID is active, an HTTP
//! DELETE with the `MCP-Session-Id` header is issued from a detached
//! thread. This is spec-required session termination and is best-effort.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use tokio::sync::{mpsc, RwLock};

use crate::error::{Result, ToolscopeError};
use crate::mcp::transport::Transport;
use crate::mcp::types::LATEST_PROTOCOL_VERSION;

/// Streamable HTTP transport.
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashMap;
/// use std::time::Duration;
/// use url::Url;
/// use toolscope::mcp::transport::http::HttpTransport;
///
/// let transport = HttpTransport::new(
///     Url::parse("http://localhost:3000/mcp").unwrap(),
///     HashMap::new(),
///     Duration::from_secs(30),
/// );
/// ```
#[derive(Debug)]
pub struct HttpTransport {
    /// Underlying reqwest HTTP client.
    http_client: Arc<reqwest::Client>,
    /// MCP endpoint URL (POST target).
    endpoint: url::Url,
    /// Active session ID, populated after `initialize` succeeds.
    session_id: Arc<RwLock<Option<String>>>,
    /// Static extra headers merged into every request (auth tokens).
    headers: HashMap<String, String>,
    /// Sender for inbound JSON-RPC message strings.
    response_tx: mpsc::UnboundedSender<String>,
    /// Shared receiver exposed via `receive()`.
    response_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl HttpTransport {
    /// Construct a new [`HttpTransport`] targeting `endpoint`.
    ///
    /// The `headers` map is merged into every outbound request. The
    /// `timeout` applies to each individual HTTP request. No network I/O
    /// is performed at construction time.
    pub fn new(endpoint: url::Url, headers: HashMap<String, String>, timeout: Duration) -> Self {
        let http_client = Arc::new(
            reqwest::Client::builder()
                .timeout(timeout)
                .build()
                // Client construction only fails if TLS initialisation
                // fails, which is a fatal startup condition.
                .expect("failed to build reqwest client"),
        );

        let (response_tx, response_rx) = mpsc::unbounded_channel();

        Self {
            http_client,
            endpoint,
            session_id: Arc::new(RwLock::new(None)),
            headers,
            response_tx,
            response_rx: Arc::new(tokio::sync::Mutex::new(response_rx)),
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    /// Send a JSON-RPC message via HTTP POST to the MCP endpoint.
    ///
    /// Mandatory headers on every POST:
    ///
    /// - `Content-Type: application/json`
    /// - `Accept: application/json, text/event-stream`
    /// - `MCP-Protocol-Version: <version>`
    /// - `MCP-Session-Id: <id>` -- only when a session is active
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails, the server returns a
    /// non-success status, or a `404` is received while a session is
    /// active (session expiry).
    async fn send(&self, message: String) -> Result<()> {
        let mut req = self
            .http_client
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .header("MCP-Protocol-Version", LATEST_PROTOCOL_VERSION)
            .body(message);

        {
            let sid = self.session_id.read().await;
            if let Some(ref id) = *sid {
                req = req.header("MCP-Session-Id", id.as_str());
            }
        }

        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req.send().await.map_err(|e| {
            // Render the full cause chain: the retry classifier keys off
            // substrings like "connection refused" that live in the
            // innermost reqwest error.
            let chain = format!("{:#}", anyhow::Error::from(e));
            anyhow::anyhow!(ToolscopeError::Transport(format!(
                "HTTP POST failed: {chain}"
            )))
        })?;

        let status = response.status();

        // 404 with an active session means the session expired.
        if status == reqwest::StatusCode::NOT_FOUND {
            let has_session = {
                let sid = self.session_id.read().await;
                sid.is_some()
            };
            if has_session {
                let mut sid = self.session_id.write().await;
                *sid = None;
                return Err(anyhow::anyhow!(ToolscopeError::Transport(
                    "server session expired".into()
                )));
            }
            return Err(anyhow::anyhow!(ToolscopeError::Transport(
                "HTTP 404 Not Found".into()
            )));
        }

        // 202 Accepted = notification acknowledgement, no body expected.
        if status == reqwest::StatusCode::ACCEPTED {
            return Ok(());
        }

        if !status.is_success() {
            return Err(anyhow::anyhow!(ToolscopeError::Transport(format!(
                "HTTP POST returned status {}",
                status
            ))));
        }

        // Capture the session ID from a successful response (typically
        // the `initialize` response).
        if let Some(new_session_id) = response
            .headers()
            .get("MCP-Session-Id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
        {
            let mut sid = self.session_id.write().await;
            if sid.is_none() {
                *sid = Some(new_session_id);
            }
        }

        let content_type = response
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("text/event-stream") {
            let byte_stream = response.bytes_stream();
            let response_tx = self.response_tx.clone();
            tokio::spawn(async move {
                parse_sse_stream(byte_stream, response_tx).await;
            });
        } else {
            // application/json or anything else: read the full body.
            let body = response.text().await.map_err(|e| {
                anyhow::anyhow!(ToolscopeError::Transport(format!(
                    "failed to read response body: {}",
                    e
                )))
            })?;
            if !body.is_empty() {
                let _ = self.response_tx.send(body);
            }
        }

        Ok(())
    }

    /// Returns inbound JSON-RPC message strings in arrival order, from
    /// direct JSON responses and SSE events alike.
    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        let rx = Arc::clone(&self.response_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await?;
            drop(guard);
            Some((item, rx))
        }))
    }

    /// The HTTP transport produces no out-of-band diagnostics.
    fn receive_err(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        Box::pin(futures::stream::empty())
    }
}

impl Drop for HttpTransport {
    /// Issue an HTTP DELETE to terminate the server-side session.
    ///
    /// Uses `try_read` to avoid blocking; if the lock is contended the
    /// cleanup is skipped. Failures are ignored because `drop` cannot
    /// return an error.
    fn drop(&mut self) {
        let session_id = match self.session_id.try_read() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };

        if let Some(sid) = session_id {
            let endpoint = self.endpoint.as_str().to_string();
            let mut extra_headers = self.headers.clone();
            extra_headers.insert("MCP-Session-Id".to_string(), sid);

            // A detached thread keeps the blocking client off the async
            // runtime.
            let _ = std::thread::spawn(move || {
                if let Ok(client) = reqwest::blocking::Client::builder()
                    .timeout(Duration::from_secs(5))
                    .build()
                {
                    let mut req = client.delete(&endpoint);
                    for (k, v) in &extra_headers {
                        req = req.header(k.as_str(), v.as_str());
                    }
                    let _ = req.send();
                }
            });
        }
    }
}

// ---------------------------------------------------------------------------
// SSE parser
// ---------------------------------------------------------------------------

/// Parse an SSE byte stream and forward complete `data:` payloads to
/// `response_tx`. Runs inside a `tokio::spawn`; consumes the stream
/// until it ends or errors.
///
/// `event: ping` events and `data: [PING]` payloads are silently
/// discarded. `id:` and `retry:` fields are ignored -- this transport
/// does not resume interrupted streams.
pub async fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    response_tx: mpsc::UnboundedSender<String>,
) {
    use futures::StreamExt;

    // Buffer accumulates raw bytes between `\n\n` boundaries.
    let mut buffer = String::new();

    tokio::pin!(byte_stream);

    while let Some(chunk_result) = byte_stream.next().await {
        let chunk = match chunk_result {
            Ok(c) => c,
            Err(_) => break,
        };

        let text = match std::str::from_utf8(&chunk) {
            Ok(s) => s.to_string(),
            Err(_) => continue,
        };

        buffer.push_str(&text);

        // SSE events are separated by blank lines.
        while let Some(pos) = buffer.find("\n\n") {
            let event_block = buffer[..pos].to_string();
            buffer = buffer[pos + 2..].to_string();
            process_sse_event(&event_block, &response_tx);
        }
    }

    // Flush any partial trailing event.
    if !buffer.is_empty() {
        process_sse_event(&buffer, &response_tx);
    }
}

/// Process a single SSE event block (text between two `\n\n` delimiters).
fn process_sse_event(event_block: &str, response_tx: &mpsc::UnboundedSender<String>) {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_type: Option<&str> = None;

    for line in event_block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim());
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
        // `id:`/`retry:` fields and `:` comments are ignored.
    }

    if let Some(et) = event_type {
        if et.eq_ignore_ascii_case("ping") {
            return;
        }
    }

    let data = data_lines.join("\n");

    if data.eq_ignore_ascii_case("[ping]") || data.is_empty() {
        return;
    }

    let _ = response_tx.send(data);
}
