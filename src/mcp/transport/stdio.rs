//! Stdio transport for child-process MCP servers
//!
//! [`StdioTransport`] spawns a child process and communicates with it
//! over its stdin/stdout pipes using newline-delimited JSON framing.
//! This is the standard transport for locally-installed servers.
//!
//! # Protocol
//!
//! - Outbound messages are written to the child's stdin as a single JSON
//!   object followed by a newline.
//! - Inbound messages are read from the child's stdout, one JSON object
//!   per line (newline stripped before delivery).
//! - The child's stderr is forwarded to a diagnostic stream and logged at
//!   debug level. Stderr output is never treated as an error condition.
//!
//! # Lifecycle
//!
//! The transport is created via [`StdioTransport::spawn`], which starts
//! three background Tokio tasks: a stdin writer, a stdout drainer, and a
//! stderr drainer. When the transport is dropped, a best-effort SIGTERM
//! (Unix) or `start_kill` (non-Unix) is sent to the child process.

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};

use crate::error::{Result, ToolscopeError};
use crate::mcp::transport::Transport;

/// Stdio-based transport that drives a child process.
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashMap;
/// use toolscope::mcp::transport::stdio::StdioTransport;
///
/// # fn main() -> anyhow::Result<()> {
/// let transport = StdioTransport::spawn(
///     "npx".into(),
///     vec!["-y".into(), "@modelcontextprotocol/server-filesystem".into(), "/tmp".into()],
///     HashMap::new(),
///     None,
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StdioTransport {
    /// Sender side of the stdin channel; `send()` writes here.
    stdin_tx: mpsc::UnboundedSender<String>,
    /// Shared receiver for stdout lines (one JSON message per line).
    stdout_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    /// Shared receiver for stderr lines (diagnostics only).
    stderr_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    /// Handle to the spawned child process; used by `Drop`.
    child: Arc<Mutex<Child>>,
}

impl StdioTransport {
    /// Spawn a child process and wire up stdio pipes.
    ///
    /// The child's environment is cleared and then populated from `env`,
    /// which the caller has already built by overlaying the descriptor's
    /// entries on the ambient environment (see
    /// [`crate::mcp::transport::build`]). If `working_dir` is `Some`,
    /// the child's working directory is set accordingly.
    ///
    /// # Arguments
    ///
    /// * `executable` - Path to the server executable.
    /// * `args` - Command-line arguments passed to the executable.
    /// * `env` - The complete, already-merged child environment.
    /// * `working_dir` - Optional working directory for the child.
    ///
    /// # Errors
    ///
    /// Returns [`ToolscopeError::Transport`] if the process cannot be
    /// spawned or the stdio pipes are unavailable.
    pub fn spawn(
        executable: PathBuf,
        args: Vec<String>,
        env: HashMap<String, String>,
        working_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let mut cmd = Command::new(&executable);
        cmd.args(&args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.env_clear().envs(&env);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            ToolscopeError::Transport(format!(
                "failed to spawn server `{}`: {}",
                executable.display(),
                e
            ))
        })?;

        // Each handle is guaranteed present because of Stdio::piped()
        // above.
        let stdin = child.stdin.take().ok_or_else(|| {
            ToolscopeError::Transport("child stdin unavailable after spawn".into())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ToolscopeError::Transport("child stdout unavailable after spawn".into())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            ToolscopeError::Transport("child stderr unavailable after spawn".into())
        })?;

        let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<String>();
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel::<String>();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel::<String>();

        // Background task: forward stdin_rx -> child stdin.
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(msg) = stdin_rx.recv().await {
                let line = format!("{}\n", msg);
                if stdin.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        // Background task: drain child stdout -> stdout_tx.
        tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if stdout_tx.send(line).is_err() {
                    break;
                }
            }
        });

        // Background task: drain child stderr -> stderr_tx + debug log.
        tokio::spawn(async move {
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(
                    target: "toolscope::transport::stdio",
                    "server stderr: {}",
                    line
                );
                if stderr_tx.send(line).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            stdin_tx,
            stdout_rx: Arc::new(Mutex::new(stdout_rx)),
            stderr_rx: Arc::new(Mutex::new(stderr_rx)),
            child: Arc::new(Mutex::new(child)),
        })
    }
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    /// Enqueue a JSON-RPC message for the child's stdin.
    ///
    /// # Errors
    ///
    /// Returns [`ToolscopeError::Transport`] if the internal channel is
    /// closed (the background writer task has exited).
    async fn send(&self, message: String) -> Result<()> {
        self.stdin_tx.send(message).map_err(|e| {
            anyhow::anyhow!(ToolscopeError::Transport(format!(
                "stdin channel closed: {}",
                e
            )))
        })
    }

    /// Returns a stream of JSON-RPC messages from the child's stdout.
    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        let rx = Arc::clone(&self.stdout_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await?;
            drop(guard);
            Some((item, rx))
        }))
    }

    /// Returns a stream of diagnostic lines from the child's stderr.
    fn receive_err(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        let rx = Arc::clone(&self.stderr_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await?;
            drop(guard);
            Some((item, rx))
        }))
    }
}

impl Drop for StdioTransport {
    /// Best-effort termination of the child process on drop.
    ///
    /// On Unix, sends SIGTERM to the child PID. On other platforms,
    /// calls `start_kill()` on the child handle. Must not block.
    fn drop(&mut self) {
        // If the lock is contended the kill is skipped; the OS reaps the
        // child when this process exits.
        if let Ok(child) = self.child.try_lock() {
            #[cfg(unix)]
            {
                if let Some(pid) = child.id() {
                    // SAFETY: pid was obtained from a live tokio Child.
                    unsafe {
                        libc::kill(pid as libc::pid_t, libc::SIGTERM);
                    }
                }
            }
            #[cfg(not(unix))]
            {
                let _ = child.start_kill();
            }
        }
    }
}
