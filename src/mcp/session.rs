//! Session lifecycle management
//!
//! A [`ServerSession`] owns one connection to one configured server for
//! the duration of a single CLI invocation. The lifecycle is
//! `Unconnected -> Connecting -> Open -> Closed`: the unconnected and
//! connecting phases live entirely inside [`ServerSession::connect`]
//! (gated by the retry executor wrapping transport construction plus the
//! handshake -- a fresh transport is built on every attempt), an
//! existing session is `Open`, and [`ServerSession::close`] moves it to
//! `Closed` exactly once.
//!
//! Operations against one session are strictly sequential; the session
//! is never shared, and each operation is independently wrapped in the
//! retry executor. Operations on a closed session fail fast with
//! [`ToolscopeError::SessionClosed`], which the failure classifier
//! treats as fatal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::config::ServerDescriptor;
use crate::error::{Result, ToolscopeError};
use crate::mcp::client::{start_read_loop, JsonRpcClient};
use crate::mcp::proto::Protocol;
use crate::mcp::transport::{self, Transport};
use crate::mcp::types::{Implementation, InitializeResult, ToolCallResult, ToolDescriptor};
use crate::retry::{with_retry, RetryPolicy};

/// The client identity sent during the handshake.
fn client_info() -> Implementation {
    Implementation {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// An open session to one tool-providing server.
///
/// Owns the underlying transport exclusively (through its protocol
/// layer). Created by [`ServerSession::connect`]; must be closed (or
/// dropped) exactly once.
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashMap;
/// use std::time::Duration;
/// use toolscope::config::ServerDescriptor;
/// use toolscope::mcp::session::ServerSession;
/// use toolscope::retry::RetryPolicy;
///
/// # async fn example() -> anyhow::Result<()> {
/// let descriptor = ServerDescriptor::Stdio {
///     command: "my-server".into(),
///     args: vec![],
///     env: HashMap::new(),
///     cwd: None,
/// };
/// let mut session = ServerSession::connect(
///     "my-server",
///     &descriptor,
///     &RetryPolicy::default(),
///     &HashMap::new(),
///     Duration::from_secs(30),
/// )
/// .await?;
/// let tools = session.list_tools().await?;
/// println!("{} tools", tools.len());
/// session.close();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ServerSession {
    name: String,
    /// `Some` while open; taken on close. Dropping the protocol drops
    /// the client and its transport handle, so the transport's own Drop
    /// (child SIGTERM / HTTP DELETE) runs as soon as the read loop and
    /// pumps wind down.
    proto: Option<Protocol>,
    cancel: CancellationToken,
    policy: RetryPolicy,
    init: InitializeResult,
}

impl ServerSession {
    /// Connect to a server described by `descriptor`.
    ///
    /// Builds the transport (spawning the child process for the stdio
    /// variant), wires the JSON-RPC client and read loop, and performs
    /// the `initialize` handshake -- all inside one retry-executor
    /// invocation, with a fresh transport per attempt.
    ///
    /// # Arguments
    ///
    /// * `name` - The configured server name (for error context).
    /// * `descriptor` - How to reach the server.
    /// * `policy` - Retry policy for the connect and later operations.
    /// * `ambient_env` - Snapshot of the process environment, merged
    ///   under the descriptor's env overlay for stdio servers.
    /// * `timeout` - Per-request deadline.
    ///
    /// # Errors
    ///
    /// Returns [`ToolscopeError::Connection`] carrying the server name
    /// and the last underlying error message once retries are exhausted
    /// or a fatal failure occurs.
    pub async fn connect(
        name: &str,
        descriptor: &ServerDescriptor,
        policy: &RetryPolicy,
        ambient_env: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        Self::connect_with_factory(name, policy, timeout, || {
            transport::build(descriptor, ambient_env, timeout)
        })
        .await
    }

    /// Connect using an explicit transport factory.
    ///
    /// The factory runs once per connect attempt so every retry gets a
    /// fresh transport. Exposed for tests that substitute an in-process
    /// transport.
    pub async fn connect_with_factory<F>(
        name: &str,
        policy: &RetryPolicy,
        timeout: Duration,
        factory: F,
    ) -> Result<Self>
    where
        F: Fn() -> Result<Arc<dyn Transport>>,
    {
        let factory = &factory;
        let outcome = with_retry("connect", policy, move || async move {
            let transport = factory()?;
            establish(name, transport, timeout).await
        })
        .await;

        match outcome {
            Ok((proto, cancel, init)) => Ok(Self {
                name: name.to_string(),
                proto: Some(proto),
                cancel,
                policy: policy.clone(),
                init,
            }),
            Err(e) => Err(ToolscopeError::Connection {
                server: name.to_string(),
                message: format!("{e:#}"),
            }
            .into()),
        }
    }

    /// The configured server name this session is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The server identity reported during the handshake.
    pub fn server_info(&self) -> &Implementation {
        &self.init.server_info
    }

    /// The full handshake response.
    pub fn initialize_result(&self) -> &InitializeResult {
        &self.init
    }

    /// List all tools advertised by the server.
    ///
    /// Retried independently of the connect per the session policy.
    ///
    /// # Errors
    ///
    /// Returns [`ToolscopeError::SessionClosed`] on a closed session;
    /// transport and protocol errors propagate after retries.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let proto = self.proto()?;
        with_retry("tools/list", &self.policy, move || proto.list_tools()).await
    }

    /// Find one tool by exact name.
    ///
    /// A filter over [`ServerSession::list_tools`]; issues exactly one
    /// discovery round-trip and no more.
    ///
    /// # Errors
    ///
    /// Same contract as [`ServerSession::list_tools`]. An unknown name
    /// is not an error; it returns `None`.
    pub async fn get_tool(&self, name: &str) -> Result<Option<ToolDescriptor>> {
        let tools = self.list_tools().await?;
        Ok(tools.into_iter().find(|t| t.name == name))
    }

    /// Invoke a named tool with opaque JSON arguments.
    ///
    /// Arguments are passed through without client-side validation
    /// against the tool's declared input schema.
    ///
    /// # Errors
    ///
    /// Returns [`ToolscopeError::SessionClosed`] on a closed session;
    /// server-side failures (unknown tool, invalid arguments) surface as
    /// protocol errors.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<ToolCallResult> {
        let proto = self.proto()?;
        with_retry("tools/call", &self.policy, move || {
            proto.call_tool(name, arguments.clone())
        })
        .await
    }

    /// Close the session, releasing the underlying transport.
    ///
    /// Idempotent at the API boundary: the first call cancels the read
    /// loop and pumps and drops the protocol layer (and with it the
    /// transport handle); subsequent calls are no-ops. Never fails,
    /// including on sessions whose connect died partway.
    pub fn close(&mut self) {
        if self.proto.take().is_some() {
            self.cancel.cancel();
            tracing::debug!("session `{}` closed", self.name);
        }
    }

    fn proto(&self) -> Result<&Protocol> {
        self.proto
            .as_ref()
            .ok_or_else(|| ToolscopeError::SessionClosed.into())
    }
}

impl Drop for ServerSession {
    /// Safety net: a dropped session releases its resources as if
    /// closed.
    fn drop(&mut self) {
        self.close();
    }
}

/// Wire a transport to a fresh JSON-RPC client and perform the
/// handshake.
///
/// Two background tasks are spawned alongside the read loop: a receive
/// pump (transport -> read loop) and a diagnostics drain. All stop on
/// cancellation or when their stream ends. On handshake failure the
/// token is cancelled before the error propagates so a retrying caller
/// never leaks tasks.
async fn establish(
    name: &str,
    transport: Arc<dyn Transport>,
    timeout: Duration,
) -> Result<(Protocol, CancellationToken, InitializeResult)> {
    let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();
    let cancel = CancellationToken::new();

    let client = Arc::new(JsonRpcClient::new(name, Arc::clone(&transport), timeout));
    start_read_loop(in_rx, cancel.clone(), Arc::clone(&client));

    // Receive pump: transport -> read loop.
    {
        let transport = Arc::clone(&transport);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut stream = transport.receive();
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    item = stream.next() => match item {
                        Some(m) => {
                            if in_tx.send(m).is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        });
    }

    // Diagnostics drain: transport stderr-equivalent -> debug log.
    {
        let transport = Arc::clone(&transport);
        let cancel = cancel.clone();
        let server = name.to_string();
        tokio::spawn(async move {
            let mut stream = transport.receive_err();
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    item = stream.next() => match item {
                        Some(line) => {
                            tracing::debug!(target: "toolscope::session", "[{server}] {line}");
                        }
                        None => break,
                    }
                }
            }
        });
    }

    let proto = Protocol::new(client);
    match proto.initialize(client_info()).await {
        Ok(init) => Ok((proto, cancel, init)),
        Err(e) => {
            cancel.cancel();
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
