//! MCP test server binary for integration tests
//!
//! A minimal MCP server speaking newline-delimited JSON over
//! stdin/stdout (the stdio transport framing). Used exclusively by
//! integration tests to exercise the full session lifecycle without a
//! real external server.
//!
//! # Handled Methods
//!
//! - `initialize` -- responds with protocol version `2025-03-26` and
//!   tool capability.
//! - `notifications/initialized` -- acknowledged silently.
//! - `tools/list` -- returns two tools: `echo` and `getenv`.
//! - `tools/call` with `name: "echo"` -- echoes back the `message`
//!   argument.
//! - `tools/call` with `name: "getenv"` -- returns the value of the
//!   environment variable named by the `name` argument, or `""` when
//!   unset. Lets tests observe the merged child environment end to end.
//! - `ping` -- returns an empty result.
//! - All other methods -- JSON-RPC `-32601 Method not found`.

use std::io::{self, BufRead, Write};

fn main() {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: serde_json::Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => {
                let response = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": { "code": -32700, "message": "Parse error" }
                });
                let _ = writeln!(out, "{}", serde_json::to_string(&response).unwrap());
                let _ = out.flush();
                continue;
            }
        };

        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let id = request
            .get("id")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        if method == "notifications/initialized" {
            continue;
        }

        let response = match method {
            "initialize" => handle_initialize(&id),
            "tools/list" => handle_tools_list(&id),
            "tools/call" => handle_tools_call(&id, &request),
            "ping" => handle_ping(&id),
            _ => make_error(&id, -32601, &format!("Method not found: {}", method)),
        };

        let serialized = match serde_json::to_string(&response) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("mcp_test_server: failed to serialize response: {}", e);
                continue;
            }
        };

        if writeln!(out, "{}", serialized).is_err() {
            break;
        }
        if out.flush().is_err() {
            break;
        }
    }
}

/// Respond to `initialize` with protocol version `2025-03-26` and the
/// tools capability.
fn handle_initialize(id: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "protocolVersion": "2025-03-26",
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": "mcp-test-server",
                "version": "0.1.0"
            }
        }
    })
}

/// Respond to `tools/list` with the `echo` and `getenv` tools.
fn handle_tools_list(id: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "tools": [
                {
                    "name": "echo",
                    "description": "Echoes input",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "message": { "type": "string" }
                        }
                    }
                },
                {
                    "name": "getenv",
                    "description": "Reads an environment variable from the server process",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" }
                        }
                    }
                }
            ]
        }
    })
}

/// Respond to `tools/call` for the two known tools.
fn handle_tools_call(id: &serde_json::Value, request: &serde_json::Value) -> serde_json::Value {
    let params = request.get("params").unwrap_or(&serde_json::Value::Null);
    let tool_name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");

    let text = match tool_name {
        "echo" => params
            .get("arguments")
            .and_then(|a| a.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("")
            .to_string(),
        "getenv" => {
            let var = params
                .get("arguments")
                .and_then(|a| a.get("name"))
                .and_then(|m| m.as_str())
                .unwrap_or("");
            std::env::var(var).unwrap_or_default()
        }
        other => {
            return make_error(id, -32602, &format!("Unknown tool: {}", other));
        }
    };

    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "content": [{ "type": "text", "text": text }],
            "isError": false
        }
    })
}

/// Respond to `ping` with an empty result object.
fn handle_ping(id: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {}
    })
}

/// Build a JSON-RPC error response.
fn make_error(id: &serde_json::Value, code: i32, message: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}
