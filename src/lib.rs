//! toolscope - library for discovering and invoking tools on MCP servers
//!
//! This library backs the `toolscope` CLI: it opens one ephemeral
//! session per server (local child process or remote HTTP endpoint),
//! performs tool discovery or invocation with a uniform transient-retry
//! policy, and tears the session down.
//!
//! # Architecture
//!
//! - `config`: configuration loading and descriptor validation
//! - `retry`: failure classification, backoff, and the retry executor
//! - `mcp`: JSON-RPC client, transports, and the session lifecycle
//! - `commands`: CLI command handlers and multi-server enumeration
//! - `error`: error types and result alias
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use toolscope::config::Config;
//! use toolscope::mcp::session::ServerSession;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load(None)?;
//! let descriptor = config.descriptor("files")?;
//! let mut session = ServerSession::connect(
//!     "files",
//!     descriptor,
//!     &config.retry,
//!     &config.ambient_env,
//!     Duration::from_secs(30),
//! )
//! .await?;
//! let tools = session.list_tools().await?;
//! session.close();
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod mcp;
pub mod retry;

// Re-export commonly used types
pub use config::{Config, ServerDescriptor};
pub use error::{Result, ToolscopeError};
pub use mcp::{ServerSession, ToolCallResult, ToolDescriptor};
pub use retry::RetryPolicy;
