//! Typed MCP lifecycle wrapper over [`JsonRpcClient`]
//!
//! [`Protocol`] layers the MCP handshake and the tool surface on the raw
//! JSON-RPC client: `initialize` + `notifications/initialized`, then
//! `tools/list` (with automatic cursor-following pagination) and
//! `tools/call`. Call ordering is enforced one level up by the session
//! manager, which only exposes tool operations once the handshake has
//! completed.

use std::sync::Arc;

use crate::error::{Result, ToolscopeError};
use crate::mcp::client::JsonRpcClient;
use crate::mcp::types::{
    ClientCapabilities, Implementation, InitializeParams, InitializeResult, ListToolsResult,
    PaginatedParams, ToolCallParams, ToolCallResult, ToolDescriptor, LATEST_PROTOCOL_VERSION,
    METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_PING, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
    SUPPORTED_PROTOCOL_VERSIONS,
};

/// Typed MCP operations over a wired [`JsonRpcClient`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use toolscope::mcp::client::JsonRpcClient;
/// use toolscope::mcp::proto::Protocol;
/// # use toolscope::mcp::transport::Transport;
///
/// # fn example(transport: Arc<dyn Transport>) {
/// let client = Arc::new(JsonRpcClient::new("demo", transport, Duration::from_secs(5)));
/// let _proto = Protocol::new(client);
/// # }
/// ```
#[derive(Debug)]
pub struct Protocol {
    client: Arc<JsonRpcClient>,
}

impl Protocol {
    /// Wrap a wired JSON-RPC client.
    ///
    /// The caller must have already started the read loop with the same
    /// `Arc` so that responses resolve this client's pending requests.
    pub fn new(client: Arc<JsonRpcClient>) -> Self {
        Self { client }
    }

    /// Perform the `initialize` / `notifications/initialized` handshake.
    ///
    /// Sends `initialize` with this client's identity, verifies the
    /// server selected a supported protocol revision, and fires the
    /// `initialized` notification.
    ///
    /// # Errors
    ///
    /// Returns [`ToolscopeError::ProtocolVersion`] if the server selects
    /// a revision outside [`SUPPORTED_PROTOCOL_VERSIONS`]; transport and
    /// timeout errors propagate from the underlying client.
    pub async fn initialize(&self, client_info: Implementation) -> Result<InitializeResult> {
        let response: InitializeResult = self
            .client
            .request(
                METHOD_INITIALIZE,
                InitializeParams {
                    protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
                    capabilities: ClientCapabilities::default(),
                    client_info,
                },
            )
            .await?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&response.protocol_version.as_str()) {
            return Err(ToolscopeError::ProtocolVersion {
                expected: SUPPORTED_PROTOCOL_VERSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                got: response.protocol_version,
            }
            .into());
        }

        // Fire-and-forget; a failed notification is not fatal to the
        // session.
        let _ = self
            .client
            .notify(METHOD_INITIALIZED, serde_json::json!({}))
            .await;

        Ok(response)
    }

    /// List all tools advertised by the server, following `nextCursor`
    /// pagination until exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if any paged request fails.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page: ListToolsResult = self
                .client
                .request(METHOD_TOOLS_LIST, PaginatedParams { cursor })
                .await?;

            tools.extend(page.tools);

            match page.next_cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        Ok(tools)
    }

    /// Invoke a named tool with opaque JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns a
    /// JSON-RPC error (e.g. unknown tool name, invalid arguments).
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<ToolCallResult> {
        self.client
            .request(
                METHOD_TOOLS_CALL,
                ToolCallParams {
                    name: name.to_string(),
                    arguments,
                },
            )
            .await
    }

    /// Send a `ping` request and verify the server responds.
    ///
    /// # Errors
    ///
    /// Returns an error if the request times out or the channel is
    /// closed.
    pub async fn ping(&self) -> Result<()> {
        let _: serde_json::Value = self.client.request(METHOD_PING, serde_json::json!({})).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::start_read_loop;
    use crate::mcp::transport::fake::{FakeTransport, FakeTransportHandle};
    use crate::mcp::transport::Transport;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    /// Build a wired `Protocol` over a fake transport.
    ///
    /// Returns `(protocol, fake_handle, inbound_tx, token)`: the handle
    /// reads what the protocol sent, and `inbound_tx` injects server
    /// responses into the read loop.
    fn wired_protocol() -> (
        Protocol,
        FakeTransportHandle,
        mpsc::UnboundedSender<String>,
        CancellationToken,
    ) {
        let (transport, handle) = FakeTransport::new();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();
        let token = CancellationToken::new();
        let client = Arc::new(JsonRpcClient::new(
            "test",
            Arc::new(transport) as Arc<dyn Transport>,
            Duration::from_secs(5),
        ));
        start_read_loop(in_rx, token.clone(), Arc::clone(&client));
        (Protocol::new(client), handle, in_tx, token)
    }

    fn client_info() -> Implementation {
        Implementation {
            name: "toolscope".to_string(),
            version: "0.3.0".to_string(),
        }
    }

    /// Respond to the next outbound request with `result`, echoing its id.
    async fn respond_next(
        handle: &mut FakeTransportHandle,
        in_tx: &mpsc::UnboundedSender<String>,
        result: serde_json::Value,
    ) {
        let raw = handle.outbound_rx.recv().await.unwrap();
        let req: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let resp = serde_json::json!({
            "jsonrpc": "2.0",
            "id": req["id"],
            "result": result
        });
        in_tx.send(serde_json::to_string(&resp).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_initialize_succeeds_with_supported_version() {
        let (proto, mut handle, in_tx, ct) = wired_protocol();

        tokio::spawn(async move {
            respond_next(
                &mut handle,
                &in_tx,
                serde_json::json!({
                    "protocolVersion": LATEST_PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "test-server", "version": "1.0.0" }
                }),
            )
            .await;
        });

        let result = proto.initialize(client_info()).await;
        assert!(result.is_ok(), "expected Ok, got: {:?}", result.err());
        let init = result.unwrap();
        assert_eq!(init.protocol_version, LATEST_PROTOCOL_VERSION);
        assert!(init.capabilities.tools.is_some());
        ct.cancel();
    }

    #[tokio::test]
    async fn test_initialize_rejects_unsupported_protocol_version() {
        let (proto, mut handle, in_tx, ct) = wired_protocol();

        tokio::spawn(async move {
            respond_next(
                &mut handle,
                &in_tx,
                serde_json::json!({
                    "protocolVersion": "1999-01-01",
                    "capabilities": {},
                    "serverInfo": { "name": "old-server", "version": "0.0.1" }
                }),
            )
            .await;
        });

        let result = proto.initialize(client_info()).await;
        assert!(result.is_err());
        let err_str = result.unwrap_err().to_string();
        assert!(
            err_str.contains("1999-01-01"),
            "unexpected error: {err_str}"
        );
        ct.cancel();
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor_pagination() {
        let (proto, mut handle, in_tx, ct) = wired_protocol();

        tokio::spawn(async move {
            respond_next(
                &mut handle,
                &in_tx,
                serde_json::json!({
                    "tools": [{ "name": "tool_a", "inputSchema": {} }],
                    "nextCursor": "page2"
                }),
            )
            .await;
            respond_next(
                &mut handle,
                &in_tx,
                serde_json::json!({
                    "tools": [{ "name": "tool_b", "inputSchema": {} }],
                    "nextCursor": null
                }),
            )
            .await;
        });

        let tools = proto.list_tools().await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "tool_a");
        assert_eq!(tools[1].name, "tool_b");
        ct.cancel();
    }

    #[tokio::test]
    async fn test_list_tools_single_page_issues_one_request() {
        let (proto, mut handle, in_tx, ct) = wired_protocol();

        let responder = tokio::spawn(async move {
            respond_next(
                &mut handle,
                &in_tx,
                serde_json::json!({ "tools": [{ "name": "only", "inputSchema": {} }] }),
            )
            .await;
            // Count any further tools/list requests; there must be none.
            let extra =
                tokio::time::timeout(Duration::from_millis(100), handle.outbound_rx.recv()).await;
            assert!(extra.is_err(), "unexpected second request: {extra:?}");
        });

        let tools = proto.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        responder.await.unwrap();
        ct.cancel();
    }

    #[tokio::test]
    async fn test_call_tool_sends_name_and_arguments() {
        let (proto, mut handle, in_tx, ct) = wired_protocol();

        let responder = tokio::spawn(async move {
            let raw = handle.outbound_rx.recv().await.unwrap();
            let req: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert_eq!(req["method"], "tools/call");
            assert_eq!(req["params"]["name"], "echo");
            assert_eq!(req["params"]["arguments"]["message"], "hi");

            let resp = serde_json::json!({
                "jsonrpc": "2.0",
                "id": req["id"],
                "result": {
                    "content": [{ "type": "text", "text": "hi" }],
                    "isError": false
                }
            });
            in_tx.send(serde_json::to_string(&resp).unwrap()).unwrap();
        });

        let result = proto
            .call_tool("echo", Some(serde_json::json!({ "message": "hi" })))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(false));
        responder.await.unwrap();
        ct.cancel();
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let (proto, mut handle, in_tx, ct) = wired_protocol();

        tokio::spawn(async move {
            respond_next(&mut handle, &in_tx, serde_json::json!({})).await;
        });

        assert!(proto.ping().await.is_ok());
        ct.cancel();
    }
}
