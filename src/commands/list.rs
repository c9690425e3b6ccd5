//! Tool listing and inspection commands
//!
//! `list` enumerates the tools of one server or of every configured
//! server; `info` shows a single tool's descriptor including its input
//! schema. Rendering is table-based for humans and JSON for machines,
//! selected by the global `--json` flag.

use std::time::Duration;

use colored::Colorize;
use prettytable::{row, Table};

use crate::commands::{enumerate_all, open_session, ServerReport};
use crate::config::Config;
use crate::error::{Result, ToolscopeError};
use crate::mcp::types::ToolDescriptor;

/// List tools for one server, or for every configured server.
///
/// With a server name, failures propagate as errors. Without one, each
/// server is visited in configuration order and per-server failures are
/// reported inline as placeholder entries.
///
/// # Arguments
///
/// * `config` - Validated application configuration.
/// * `server` - Optional server name filter.
/// * `json` - Emit JSON instead of tables.
/// * `timeout` - Per-request deadline.
///
/// # Errors
///
/// Returns an error for an unknown or unreachable named server; the
/// all-servers form only fails on output serialization.
pub async fn run_list(
    config: &Config,
    server: Option<&str>,
    json: bool,
    timeout: Duration,
) -> Result<()> {
    match server {
        Some(name) => {
            let mut session = open_session(config, name, timeout).await?;
            let tools = session.list_tools().await?;
            session.close();
            render_reports(
                &[ServerReport {
                    server: name.to_string(),
                    tools: Ok(tools),
                }],
                json,
            )
        }
        None => {
            let reports = enumerate_all(config, timeout).await;
            render_reports(&reports, json)
        }
    }
}

/// Show one tool's full descriptor.
///
/// # Errors
///
/// Returns [`ToolscopeError::ToolNotFound`] (carrying the names of all
/// advertised tools) when the server does not expose the requested
/// name.
pub async fn run_info(
    config: &Config,
    server: &str,
    tool: &str,
    json: bool,
    timeout: Duration,
) -> Result<()> {
    let mut session = open_session(config, server, timeout).await?;
    let found = session.get_tool(tool).await;
    match found {
        Ok(Some(descriptor)) => {
            session.close();
            render_tool_detail(server, &descriptor, json)
        }
        Ok(None) => {
            let available = session
                .list_tools()
                .await
                .map(|tools| tools.into_iter().map(|t| t.name).collect())
                .unwrap_or_default();
            session.close();
            Err(ToolscopeError::ToolNotFound {
                name: tool.to_string(),
                available,
            }
            .into())
        }
        Err(e) => {
            session.close();
            Err(e)
        }
    }
}

/// Render enumeration reports as tables or JSON.
fn render_reports(reports: &[ServerReport], json: bool) -> Result<()> {
    if json {
        let value: Vec<serde_json::Value> = reports
            .iter()
            .map(|report| match &report.tools {
                Ok(tools) => serde_json::json!({
                    "server": report.server,
                    "tools": tools,
                }),
                Err(message) => serde_json::json!({
                    "server": report.server,
                    "error": message,
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for report in reports {
        match &report.tools {
            Ok(tools) => {
                println!(
                    "\n{} ({} tools)",
                    report.server.as_str().bold(),
                    tools.len()
                );
                if !tools.is_empty() {
                    print_tools_table(tools);
                }
            }
            Err(message) => {
                println!(
                    "\n{} {}",
                    report.server.as_str().bold(),
                    "unreachable".red()
                );
                println!("  {}", message.as_str().dimmed());
            }
        }
    }
    println!();

    Ok(())
}

/// Render a single tool's descriptor.
fn render_tool_detail(server: &str, tool: &ToolDescriptor, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(tool)?);
        return Ok(());
    }

    println!("\n{} / {}\n", server.bold(), tool.name.as_str().cyan().bold());
    if let Some(description) = &tool.description {
        println!("{description}\n");
    }
    println!("Input schema:");
    println!("{}", serde_json::to_string_pretty(&tool.input_schema)?);

    Ok(())
}

fn print_tools_table(tools: &[ToolDescriptor]) {
    let mut table = Table::new();
    table.add_row(row!["NAME", "DESCRIPTION"]);
    for tool in tools {
        table.add_row(row![
            tool.name,
            tool.description.as_deref().unwrap_or("-")
        ]);
    }
    table.printstd();
}
