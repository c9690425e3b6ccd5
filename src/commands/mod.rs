//! Command handlers for toolscope
//!
//! Each submodule implements one CLI subcommand by composing the session
//! manager: open a session, perform one discovery or invocation
//! operation, close. The multi-server enumeration used by `list` and
//! `search` isolates per-server failures: an unreachable server becomes
//! a placeholder entry rather than aborting the whole run, and results
//! are reported in configuration order.

pub mod call;
pub mod list;
pub mod search;

use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::mcp::session::ServerSession;
use crate::mcp::types::ToolDescriptor;

/// The outcome of listing one server's tools during enumeration.
///
/// `tools` is `Ok` with the discovered tool list, or `Err` carrying the
/// failure message as the placeholder for an unreachable server.
#[derive(Debug)]
pub struct ServerReport {
    /// The configured server name.
    pub server: String,
    /// Discovered tools, or the failure that replaced them.
    pub tools: std::result::Result<Vec<ToolDescriptor>, String>,
}

/// Open a session to a named server from the configuration.
///
/// # Errors
///
/// Returns [`crate::error::ToolscopeError::UnknownServer`] for a name
/// missing from the configuration, or a connection error after retries.
pub async fn open_session(
    config: &Config,
    name: &str,
    timeout: Duration,
) -> Result<ServerSession> {
    let descriptor = config.descriptor(name)?;
    ServerSession::connect(
        name,
        descriptor,
        &config.retry,
        &config.ambient_env,
        timeout,
    )
    .await
}

/// Connect to every configured server in order and list its tools.
///
/// Servers are visited sequentially; a failure to connect or list is
/// recorded in that server's report and enumeration continues. Every
/// session is closed before the next server is attempted.
pub async fn enumerate_all(config: &Config, timeout: Duration) -> Vec<ServerReport> {
    let mut reports = Vec::new();

    for (name, descriptor) in config.servers() {
        let outcome = async {
            let mut session = ServerSession::connect(
                name,
                descriptor,
                &config.retry,
                &config.ambient_env,
                timeout,
            )
            .await?;
            let tools = session.list_tools().await;
            session.close();
            tools
        }
        .await;

        let tools = match outcome {
            Ok(tools) => Ok(tools),
            Err(e) => {
                tracing::warn!("server `{name}` failed during enumeration: {e:#}");
                Err(format!("{e:#}"))
            }
        };

        reports.push(ServerReport {
            server: name.to_string(),
            tools,
        });
    }

    reports
}
