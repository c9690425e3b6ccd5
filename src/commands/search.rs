//! Cross-server tool search
//!
//! `search` enumerates every configured server (with the same
//! per-server failure isolation as `list`) and filters the combined
//! tool set: glob matching against tool names, case-insensitive
//! substring matching against names and descriptions.

use std::time::Duration;

use colored::Colorize;
use glob_match::glob_match;
use prettytable::{row, Table};

use crate::commands::{enumerate_all, ServerReport};
use crate::config::Config;
use crate::error::Result;
use crate::mcp::types::ToolDescriptor;

/// One search hit: a tool and the server advertising it.
#[derive(Debug)]
pub struct SearchHit {
    /// The configured server name.
    pub server: String,
    /// The matching tool.
    pub tool: ToolDescriptor,
}

/// Search all configured servers' tools for a pattern.
///
/// Unreachable servers are reported alongside the hits rather than
/// failing the search.
///
/// # Errors
///
/// Only fails on output serialization; per-server connection failures
/// are folded into the report.
pub async fn run_search(
    config: &Config,
    pattern: &str,
    json: bool,
    timeout: Duration,
) -> Result<()> {
    let reports = enumerate_all(config, timeout).await;
    let (hits, failures) = collect_hits(&reports, pattern);
    render_search(pattern, &hits, &failures, json)
}

/// Filter enumeration reports down to matching tools, in configuration
/// order. Returns the hits and the `(server, message)` pairs for
/// servers that could not be listed.
fn collect_hits<'a>(
    reports: &'a [ServerReport],
    pattern: &str,
) -> (Vec<SearchHit>, Vec<(&'a str, &'a str)>) {
    let mut hits = Vec::new();
    let mut failures = Vec::new();

    for report in reports {
        match &report.tools {
            Ok(tools) => {
                for tool in tools {
                    if tool_matches(tool, pattern) {
                        hits.push(SearchHit {
                            server: report.server.clone(),
                            tool: tool.clone(),
                        });
                    }
                }
            }
            Err(message) => failures.push((report.server.as_str(), message.as_str())),
        }
    }

    (hits, failures)
}

/// A tool matches when the glob pattern matches its name, or the
/// pattern occurs (case-insensitively) in its name or description.
fn tool_matches(tool: &ToolDescriptor, pattern: &str) -> bool {
    if glob_match(pattern, &tool.name) {
        return true;
    }
    let needle = pattern.to_lowercase();
    if tool.name.to_lowercase().contains(&needle) {
        return true;
    }
    tool.description
        .as_deref()
        .map(|d| d.to_lowercase().contains(&needle))
        .unwrap_or(false)
}

fn render_search(
    pattern: &str,
    hits: &[SearchHit],
    failures: &[(&str, &str)],
    json: bool,
) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "pattern": pattern,
            "matches": hits
                .iter()
                .map(|hit| serde_json::json!({ "server": hit.server, "tool": hit.tool }))
                .collect::<Vec<_>>(),
            "failures": failures
                .iter()
                .map(|(server, message)| serde_json::json!({ "server": server, "error": message }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No tools matched `{pattern}`");
    } else {
        let mut table = Table::new();
        table.add_row(row!["SERVER", "TOOL", "DESCRIPTION"]);
        for hit in hits {
            table.add_row(row![
                hit.server,
                hit.tool.name,
                hit.tool.description.as_deref().unwrap_or("-")
            ]);
        }
        table.printstd();
    }

    for (server, message) in failures {
        println!(
            "{} {} {}",
            "warning:".yellow().bold(),
            format!("server `{server}` unreachable:").yellow(),
            message.dimmed()
        );
    }

    Ok(())
}
