//! Transport-backed async JSON-RPC 2.0 client
//!
//! [`JsonRpcClient`] issues JSON-RPC 2.0 requests over a
//! [`Transport`](crate::mcp::transport::Transport) and correlates
//! responses via a background read loop.
//!
//! # Design
//!
//! - Outbound messages go straight to [`Transport::send`], so transport
//!   failures (connection refused, HTTP 5xx) propagate to the caller
//!   with their original text intact -- the failure classifier depends
//!   on that text.
//! - Inbound messages arrive on an mpsc channel fed by the session's
//!   receive pump. [`start_read_loop`] classifies each message and
//!   resolves the matching entry in a `pending` map keyed by `u64`
//!   request ID; each entry is a [`oneshot::Sender`] that receives the
//!   `result` or `error` value.
//! - A [`CancellationToken`] stops the read loop cleanly and drops all
//!   pending senders so awaiting callers receive an error instead of
//!   hanging until their timeout.
//! - This client only originates requests and notifications.
//!   Server-initiated requests are answered with JSON-RPC `-32601`;
//!   server notifications are logged and discarded, since a one-shot
//!   CLI session has nothing to refresh.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ToolscopeError};
use crate::mcp::transport::Transport;
use crate::mcp::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// Default timeout applied to every request when the caller does not
/// override it via configuration or the `--timeout` flag.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The pending-response map: request ID to the oneshot resolver.
type PendingMap =
    HashMap<u64, oneshot::Sender<std::result::Result<serde_json::Value, JsonRpcError>>>;

/// JSON-RPC 2.0 client bound to one server session.
///
/// Create one with [`JsonRpcClient::new`], then call [`start_read_loop`]
/// with the same `Arc` so responses resolve the pending map the
/// requests register in.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
/// use toolscope::mcp::client::{start_read_loop, JsonRpcClient};
/// # use toolscope::mcp::transport::Transport;
///
/// # async fn example(transport: Arc<dyn Transport>) {
/// let client = Arc::new(JsonRpcClient::new("demo", transport, Duration::from_secs(5)));
/// let (_in_tx, in_rx) = mpsc::unbounded_channel::<String>();
/// let token = CancellationToken::new();
/// let _handle = start_read_loop(in_rx, token, Arc::clone(&client));
/// # }
/// ```
pub struct JsonRpcClient {
    /// Configured server name, used in timeout errors.
    server: String,
    /// Monotonically increasing request ID counter.
    next_id: AtomicU64,
    /// In-flight requests waiting for a response.
    pending: Mutex<PendingMap>,
    /// The transport this client writes to.
    transport: Arc<dyn Transport>,
    /// Per-request response deadline.
    timeout: Duration,
}

impl std::fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("server", &self.server)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl JsonRpcClient {
    /// Create a new `JsonRpcClient` over `transport`.
    ///
    /// The caller is responsible for pumping [`Transport::receive`] into
    /// the inbound channel given to [`start_read_loop`].
    ///
    /// # Arguments
    ///
    /// * `server` - Configured server name (used in error context).
    /// * `transport` - The transport to write outbound messages to.
    /// * `timeout` - Deadline applied to every request.
    pub fn new(
        server: impl Into<String>,
        transport: Arc<dyn Transport>,
        timeout: Duration,
    ) -> Self {
        Self {
            server: server.into(),
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            transport,
            timeout,
        }
    }

    /// Send a JSON-RPC request and await the typed response.
    ///
    /// Assigns the next monotonic ID, serializes the request, writes it
    /// to the transport, and waits for the matching response.
    ///
    /// # Errors
    ///
    /// Transport failures propagate unchanged (their message text drives
    /// retry classification). Returns [`ToolscopeError::Timeout`] if no
    /// response arrives within the configured deadline,
    /// [`ToolscopeError::Transport`] if the read loop exits first,
    /// [`ToolscopeError::Protocol`] if the server returns a JSON-RPC
    /// error, and [`ToolscopeError::Serialization`] on (de)serialization
    /// failure.
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: serde::Serialize + Send,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        // Register the pending slot before sending so the response can
        // never arrive before we are ready to receive it.
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        let message = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(id)),
            method: method.to_string(),
            params: Some(serde_json::to_value(params)?),
        })?;

        if let Err(e) = self.transport.send(message).await {
            let mut pending = self.pending.lock().await;
            pending.remove(&id);
            return Err(e);
        }

        let outcome = tokio::time::timeout(self.timeout, rx).await.map_err(|_| {
            ToolscopeError::Timeout {
                server: self.server.clone(),
                method: method.to_string(),
            }
        })?;

        // The oneshot was dropped (read loop exited) before a response.
        let rpc_result = outcome.map_err(|_| {
            ToolscopeError::Transport("read loop exited before response arrived".to_string())
        })?;

        let value = rpc_result.map_err(|e| ToolscopeError::Protocol(e.to_string()))?;

        serde_json::from_value(value).map_err(|e| ToolscopeError::Serialization(e).into())
    }

    /// Send a JSON-RPC notification (no response expected).
    ///
    /// # Errors
    ///
    /// Transport failures propagate unchanged;
    /// [`ToolscopeError::Serialization`] on encode failure.
    pub async fn notify<P: serde::Serialize + Send>(&self, method: &str, params: P) -> Result<()> {
        let message = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.to_string(),
            params: Some(serde_json::to_value(params)?),
        })?;

        self.transport.send(message).await
    }
}

/// Start the JSON-RPC read loop as a background Tokio task.
///
/// The loop reads serialized JSON strings from `inbound_rx`, classifies
/// each message, and dispatches it:
///
/// - **Response** (has `"id"` and `"result"` or `"error"`): resolves the
///   matching pending [`oneshot`] sender.
/// - **Server-initiated request** (has `"id"` and `"method"`): answered
///   with JSON-RPC `-32601 Method not found` -- this client registers no
///   server-request handlers.
/// - **Notification** (has `"method"` but no `"id"`): logged at debug
///   level and discarded.
///
/// On cancellation, all pending senders are dropped so any in-flight
/// `request()` call receives a channel-closed error rather than blocking
/// until its timeout.
pub fn start_read_loop(
    mut inbound_rx: mpsc::UnboundedReceiver<String>,
    cancellation: CancellationToken,
    client: Arc<JsonRpcClient>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => {
                    let mut pending = client.pending.lock().await;
                    pending.clear();
                    break;
                }

                maybe_msg = inbound_rx.recv() => {
                    let raw = match maybe_msg {
                        Some(s) => s,
                        None => {
                            // Inbound channel closed; treat as cancellation.
                            let mut pending = client.pending.lock().await;
                            pending.clear();
                            break;
                        }
                    };

                    dispatch_message(&raw, &client).await;
                }
            }
        }
    })
}

/// Classify and dispatch a single inbound JSON string.
async fn dispatch_message(raw: &str, client: &Arc<JsonRpcClient>) {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("read loop: failed to parse inbound JSON: {e}");
            return;
        }
    };

    let has_id = value.get("id").is_some() && !value["id"].is_null();
    let has_method = value.get("method").is_some();
    let has_result = value.get("result").is_some();
    let has_error = value.get("error").is_some();

    if has_id && (has_result || has_error) && !has_method {
        handle_response(value, client).await;
    } else if has_id && has_method {
        reject_server_request(value, client).await;
    } else if has_method && !has_id {
        let method = value["method"].as_str().unwrap_or("?");
        tracing::debug!("read loop: ignoring server notification '{method}'");
    } else {
        tracing::debug!(
            "read loop: unclassifiable message ignored; \
             has_id={has_id} has_method={has_method} has_result={has_result} has_error={has_error}"
        );
    }
}

/// Resolve a pending request sender with the response value or error.
async fn handle_response(value: serde_json::Value, client: &Arc<JsonRpcClient>) {
    let id_val = &value["id"];
    let id: u64 = if let Some(n) = id_val.as_u64() {
        n
    } else if let Some(s) = id_val.as_str() {
        match s.parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!("read loop: response has non-integer id: {id_val}");
                return;
            }
        }
    } else {
        tracing::warn!("read loop: response has non-integer id: {id_val}");
        return;
    };

    let tx = {
        let mut pending = client.pending.lock().await;
        pending.remove(&id)
    };

    let Some(tx) = tx else {
        tracing::debug!("read loop: response for unknown id {id}; ignoring");
        return;
    };

    let outcome: std::result::Result<serde_json::Value, JsonRpcError> =
        if let Some(error_val) = value.get("error") {
            match serde_json::from_value::<JsonRpcError>(error_val.clone()) {
                Ok(e) => Err(e),
                Err(_) => Err(JsonRpcError {
                    code: -32603,
                    message: format!("malformed error object: {error_val}"),
                    data: None,
                }),
            }
        } else {
            Ok(value
                .get("result")
                .cloned()
                .unwrap_or(serde_json::Value::Null))
        };

    // Ignore send errors: the caller may have already timed out.
    let _ = tx.send(outcome);
}

/// Answer a server-initiated request with `-32601 Method not found`.
async fn reject_server_request(value: serde_json::Value, client: &Arc<JsonRpcClient>) {
    let method = value["method"].as_str().unwrap_or("?").to_string();
    let id = value.get("id").cloned().unwrap_or(serde_json::Value::Null);

    tracing::debug!("read loop: rejecting server-initiated request '{method}'");

    let response = JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id: Some(id),
        result: None,
        error: Some(JsonRpcError {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }),
    };

    if let Ok(serialized) = serde_json::to_string(&response) {
        if let Err(e) = client.transport.send(serialized).await {
            tracing::debug!("read loop: failed to send rejection: {e:#}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::fake::{FakeTransport, FakeTransportHandle};
    use std::time::Duration;

    /// Build an in-process client over a fake transport.
    ///
    /// Inbound messages are injected through `in_tx` (feeding the read
    /// loop directly, as the session's receive pump would); outbound
    /// messages appear on the fake handle's `outbound_rx`.
    fn make_client(
        timeout: Duration,
    ) -> (
        Arc<JsonRpcClient>,
        FakeTransportHandle,
        mpsc::UnboundedSender<String>,
        CancellationToken,
    ) {
        let (transport, handle) = FakeTransport::new();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();
        let token = CancellationToken::new();
        let client = Arc::new(JsonRpcClient::new("test", Arc::new(transport), timeout));
        start_read_loop(in_rx, token.clone(), Arc::clone(&client));
        (client, handle, in_tx, token)
    }

    #[tokio::test]
    async fn test_request_resolves_with_correct_result() {
        let (client, mut handle, in_tx, _token) = make_client(Duration::from_secs(5));

        // Echo a successful response back on the inbound channel.
        tokio::spawn(async move {
            let sent = handle.outbound_rx.recv().await.unwrap();
            let req: serde_json::Value = serde_json::from_str(&sent).unwrap();
            let response = serde_json::json!({
                "jsonrpc": "2.0",
                "id": req["id"],
                "result": { "tools": [] }
            });
            in_tx
                .send(serde_json::to_string(&response).unwrap())
                .unwrap();
        });

        #[derive(serde::Deserialize, Debug)]
        struct ToolsPage {
            tools: Vec<serde_json::Value>,
        }

        let result: Result<ToolsPage> = client.request("tools/list", serde_json::json!({})).await;
        assert!(result.is_ok(), "expected Ok, got: {result:?}");
        assert!(result.unwrap().tools.is_empty());
    }

    #[tokio::test]
    async fn test_request_timeout_fires_with_server_and_method() {
        let (client, _handle, _in_tx, _token) = make_client(Duration::from_millis(50));

        // No response is ever sent; the request must time out.
        let result: Result<serde_json::Value> =
            client.request("tools/list", serde_json::json!({})).await;

        assert!(result.is_err());
        let err_str = result.unwrap_err().to_string();
        assert!(
            err_str.contains("test") && err_str.contains("tools/list"),
            "unexpected error: {err_str}"
        );
    }

    #[tokio::test]
    async fn test_request_transport_failure_propagates_unchanged() {
        let (transport, handle) = FakeTransport::new();
        // Dropping the handle closes the fake's outbound channel, so
        // send() fails.
        drop(handle);

        let (_in_tx, in_rx) = mpsc::unbounded_channel::<String>();
        let token = CancellationToken::new();
        let client = Arc::new(JsonRpcClient::new(
            "test",
            Arc::new(transport) as Arc<dyn Transport>,
            Duration::from_secs(5),
        ));
        start_read_loop(in_rx, token, Arc::clone(&client));

        let result: Result<serde_json::Value> =
            client.request("tools/list", serde_json::json!({})).await;
        let err_str = result.unwrap_err().to_string();
        assert!(
            err_str.contains("outbound channel closed"),
            "unexpected error: {err_str}"
        );
    }

    #[tokio::test]
    async fn test_pending_sender_dropped_cleanly_on_cancel() {
        let (client, _handle, _in_tx, token) = make_client(Duration::from_secs(10));

        let client_clone = Arc::clone(&client);
        let request_task = tokio::spawn(async move {
            let result: Result<serde_json::Value> = client_clone
                .request("tools/list", serde_json::json!({}))
                .await;
            result
        });

        // Give the request time to register in pending.
        tokio::time::sleep(Duration::from_millis(20)).await;

        token.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(2), request_task)
            .await
            .expect("request task did not complete after loop exit")
            .expect("task panicked");

        assert!(outcome.is_err(), "expected an error after cancel, got Ok");
    }

    #[tokio::test]
    async fn test_json_rpc_error_response_mapped_to_protocol_error() {
        let (client, mut handle, in_tx, _token) = make_client(Duration::from_secs(5));

        tokio::spawn(async move {
            let sent = handle.outbound_rx.recv().await.unwrap();
            let req: serde_json::Value = serde_json::from_str(&sent).unwrap();
            let response = serde_json::json!({
                "jsonrpc": "2.0",
                "id": req["id"],
                "error": { "code": -32601, "message": "Method not found" }
            });
            in_tx
                .send(serde_json::to_string(&response).unwrap())
                .unwrap();
        });

        let result: Result<serde_json::Value> = client
            .request("nonexistent/method", serde_json::json!({}))
            .await;

        assert!(result.is_err());
        let err_str = result.unwrap_err().to_string();
        assert!(
            err_str.contains("Method not found"),
            "unexpected error string: {err_str}"
        );
    }

    #[tokio::test]
    async fn test_notify_sends_without_id() {
        let (client, mut handle, _in_tx, _token) = make_client(Duration::from_secs(5));

        client
            .notify("notifications/initialized", serde_json::json!({}))
            .await
            .unwrap();

        let raw = handle.outbound_rx.recv().await.unwrap();
        let val: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(val["method"], "notifications/initialized");
        assert!(val.get("id").is_none(), "notifications must not have an id");
    }

    #[tokio::test]
    async fn test_server_initiated_request_answered_with_method_not_found() {
        let (_client, mut handle, in_tx, _token) = make_client(Duration::from_secs(5));

        let server_request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 99,
            "method": "sampling/createMessage",
            "params": {}
        });
        in_tx
            .send(serde_json::to_string(&server_request).unwrap())
            .unwrap();

        let raw = tokio::time::timeout(Duration::from_secs(2), handle.outbound_rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        let response: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(response["id"], 99);
        assert_eq!(response["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_multiple_concurrent_requests_resolved_correctly() {
        let (client, mut handle, in_tx, _token) = make_client(Duration::from_secs(5));

        // Respond to every outbound request with a matching result.
        tokio::spawn(async move {
            while let Some(raw) = handle.outbound_rx.recv().await {
                let req: serde_json::Value = serde_json::from_str(&raw).unwrap();
                if let Some(id) = req.get("id") {
                    if id.is_null() {
                        continue;
                    }
                    let resp = serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": { "echo": id }
                    });
                    in_tx.send(serde_json::to_string(&resp).unwrap()).unwrap();
                }
            }
        });

        let (r1, r2, r3) = tokio::join!(
            client.request::<_, serde_json::Value>("ping", serde_json::json!({})),
            client.request::<_, serde_json::Value>("ping", serde_json::json!({})),
            client.request::<_, serde_json::Value>("ping", serde_json::json!({})),
        );

        let ids: std::collections::HashSet<u64> = [r1.unwrap(), r2.unwrap(), r3.unwrap()]
            .into_iter()
            .map(|v| v["echo"].as_u64().unwrap())
            .collect();
        assert_eq!(ids.len(), 3, "each request should have a unique ID");
    }
}
