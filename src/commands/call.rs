//! Tool invocation command
//!
//! `call` opens a session, confirms the tool exists (so an unknown name
//! is reported with the server's actual tool list rather than a bare
//! server error), invokes it with the supplied JSON arguments, prints
//! the result, and closes the session.

use std::time::Duration;

use colored::Colorize;

use crate::commands::open_session;
use crate::config::Config;
use crate::error::{Result, ToolscopeError};
use crate::mcp::types::{ToolCallResult, ToolContent};

/// Invoke a named tool and print its result.
///
/// Arguments are parsed as a JSON object and passed through opaquely;
/// no client-side validation against the tool's input schema is
/// performed.
///
/// # Errors
///
/// Returns [`ToolscopeError::InvalidArguments`] when `args` is not a
/// JSON object, [`ToolscopeError::ToolNotFound`] when the server does
/// not advertise the tool, or the underlying session error otherwise.
pub async fn run_call(
    config: &Config,
    server: &str,
    tool: &str,
    args: Option<&str>,
    json: bool,
    timeout: Duration,
) -> Result<()> {
    let arguments = args.map(parse_arguments).transpose()?;

    let mut session = open_session(config, server, timeout).await?;

    let outcome = async {
        let known = session.get_tool(tool).await?;
        if known.is_none() {
            let available = session
                .list_tools()
                .await
                .map(|tools| tools.into_iter().map(|t| t.name).collect())
                .unwrap_or_default();
            return Err(ToolscopeError::ToolNotFound {
                name: tool.to_string(),
                available,
            }
            .into());
        }
        session.call_tool(tool, arguments).await
    }
    .await;

    session.close();

    let result = outcome?;
    render_call_result(&result, json)
}

/// Parse the `--args` string into a JSON object.
fn parse_arguments(raw: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ToolscopeError::InvalidArguments(format!("not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(ToolscopeError::InvalidArguments(format!(
            "expected a JSON object, got: {value}"
        ))
        .into());
    }
    Ok(value)
}

/// Render a tool result: text content as plain lines, everything else
/// as JSON.
fn render_call_result(result: &ToolCallResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    if result.is_error == Some(true) {
        println!("{}", "tool reported an error".red().bold());
    }

    for content in &result.content {
        match content {
            ToolContent::Text { text } => println!("{text}"),
            other => println!("{}", serde_json::to_string_pretty(other)?),
        }
    }

    if let Some(structured) = &result.structured_content {
        println!("{}", serde_json::to_string_pretty(structured)?);
    }

    Ok(())
}
