//! Error types for toolscope
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling. Variants carry enough
//! structured context (subject name, candidate lists) for the command layer
//! to render a kind, a primary message, and an actionable suggestion.

use thiserror::Error;

/// Main error type for toolscope operations
///
/// This enum encompasses all possible errors that can occur during
/// configuration loading, server connection, tool discovery, and tool
/// invocation.
#[derive(Error, Debug)]
pub enum ToolscopeError {
    /// Configuration-related errors (malformed file, bad descriptor shape)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A server name that does not appear in the configuration
    #[error("Unknown server `{name}`; known servers: {}", known.join(", "))]
    UnknownServer {
        /// The name that was requested
        name: String,
        /// All server names present in the configuration, sorted
        known: Vec<String>,
    },

    /// Connection to a server could not be established (after retries)
    #[error("Failed to connect to server `{server}`: {message}")]
    Connection {
        /// The configured server name
        server: String,
        /// The last underlying error message
        message: String,
    },

    /// Transport-level failures (broken pipe, HTTP failure, closed channel)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A request did not receive a response within the deadline
    #[error("Request timeout for server `{server}` on method `{method}`")]
    Timeout {
        /// The server the request was issued against
        server: String,
        /// The JSON-RPC method that timed out
        method: String,
    },

    /// The server returned a JSON-RPC error or violated the protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server negotiated a protocol version this client does not speak
    #[error("Unsupported protocol version `{got}` (supported: {})", expected.join(", "))]
    ProtocolVersion {
        /// Versions this client accepts
        expected: Vec<String>,
        /// The version the server selected
        got: String,
    },

    /// A named tool does not exist on the connected server
    #[error("Tool `{name}` not found; available tools: {}", available.join(", "))]
    ToolNotFound {
        /// The requested tool name
        name: String,
        /// Names of all tools the server advertised
        available: Vec<String>,
    },

    /// Tool arguments could not be parsed as JSON
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// An operation was issued against a session that was already closed
    #[error("Session is closed")]
    SessionClosed,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse errors
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ToolscopeError {
    /// A short human-readable kind label for the command layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::UnknownServer { .. } => "configuration",
            Self::Connection { .. } | Self::Transport(_) | Self::Timeout { .. } => "transport",
            Self::Protocol(_) | Self::ProtocolVersion { .. } => "protocol",
            Self::ToolNotFound { .. } | Self::InvalidArguments(_) => "tool",
            Self::SessionClosed => "usage",
            Self::Io(_) => "io",
            Self::Serialization(_) | Self::Yaml(_) => "serialization",
            Self::Http(_) | Self::Url(_) => "http",
        }
    }
}

/// Result type alias for toolscope operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
