//! Command-line interface definition for toolscope
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for listing, inspecting, invoking, and searching
//! server tools.

use clap::{Parser, Subcommand};

/// toolscope - discover and invoke tools on MCP servers
///
/// Each invocation opens one connection per server it touches, performs
/// one logical operation, and tears the connection down.
#[derive(Parser, Debug, Clone)]
#[command(name = "toolscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "TOOLSCOPE_CONFIG")]
    pub config: Option<String>,

    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Per-request timeout in seconds (overrides configuration)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for toolscope
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List tools: all configured servers, or one named server
    List {
        /// Server to list; omit to enumerate every configured server
        server: Option<String>,
    },

    /// Show one tool's name, description, and input schema
    Info {
        /// Server the tool lives on
        server: String,

        /// Tool name
        tool: String,
    },

    /// Invoke a tool and print its result
    Call {
        /// Server the tool lives on
        server: String,

        /// Tool name
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,
    },

    /// Search all servers' tools by name pattern or description text
    Search {
        /// Glob pattern matched against tool names (and, as a plain
        /// substring, against descriptions)
        pattern: String,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
