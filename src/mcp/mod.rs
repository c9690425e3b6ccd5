//! MCP client support for toolscope
//!
//! Everything needed to open one ephemeral session to a tool-providing
//! server, discover or invoke its tools, and tear the session down.
//!
//! # Module Layout
//!
//! - `types`     -- JSON-RPC 2.0 primitives and the MCP tools surface
//! - `client`    -- transport-agnostic async JSON-RPC 2.0 client
//! - `proto`     -- typed handshake and tool operations over the client
//! - `transport` -- [`transport::Transport`] trait, factory, and the
//!   stdio/HTTP implementations
//! - `session`   -- the connect / discover / invoke / close lifecycle,
//!   retry-wrapped

pub mod client;
pub mod proto;
pub mod session;
pub mod transport;
pub mod types;

pub use session::ServerSession;
pub use types::{ToolCallResult, ToolDescriptor};
