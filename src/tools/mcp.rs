//! Stdio tool-server transport
//!
//! Speaks newline-delimited JSON-RPC 2.0 to a spawned server process:
//! `initialize`, then `notifications/initialized`, then `tools/call` per
//! invocation. Responses are matched by id so a late reply to an abandoned
//! request is skipped instead of being taken for the next one.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, trace, warn};

use crate::core::config::RemoteServerConfig;
use crate::core::{CouncilError, Result};
use crate::tools::remote::{RemoteConnection, RemoteConnector};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Launches tool servers as child processes
#[derive(Debug, Default, Clone)]
pub struct StdioConnector;

#[async_trait]
impl RemoteConnector for StdioConnector {
    async fn connect(&self, server_id: &str, config: &RemoteServerConfig) -> Result<Box<dyn RemoteConnection>> {
        let mut conn = StdioConnection::spawn(server_id, config)?;
        if let Err(e) = conn.initialize().await {
            conn.close().await;
            return Err(e);
        }
        Ok(Box::new(conn))
    }
}

/// A running tool server and its stdio pipes
pub struct StdioConnection {
    server_id: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    in_flight: Option<u64>,
}

impl StdioConnection {
    fn spawn(server_id: &str, config: &RemoteServerConfig) -> Result<Self> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CouncilError::protocol(format!("failed to launch {}: {}", config.command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CouncilError::protocol("server stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CouncilError::protocol("server stdout unavailable"))?;

        debug!(server_id, command = %config.command, "launched tool server");

        Ok(Self {
            server_id: server_id.to_string(),
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            in_flight: None,
        })
    }

    async fn initialize(&mut self) -> Result<()> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await?;
        trace!(server_id = %self.server_id, ?result, "initialize result");
        self.notify("notifications/initialized", json!({})).await
    }

    async fn write_frame(&mut self, frame: &Value) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| CouncilError::protocol("connection closed"))?;
        let mut line = serde_json::to_string(frame)?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<()> {
        self.write_frame(&json!({ "jsonrpc": "2.0", "method": method, "params": params }))
            .await
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        self.in_flight = Some(id);

        self.write_frame(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await?;

        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| CouncilError::protocol("server closed its output"))?;
            if line.trim().is_empty() {
                continue;
            }
            match match_response(&line, id) {
                Some(outcome) => {
                    self.in_flight = None;
                    return outcome;
                }
                None => trace!(server_id = %self.server_id, line = %line, "skipping unrelated frame"),
            }
        }
    }
}

/// Interpret one frame as the response to `id`
///
/// Returns `None` for notifications, server requests, unparseable lines and
/// responses to other ids.
fn match_response(line: &str, id: u64) -> Option<Result<Value>> {
    let frame: Value = serde_json::from_str(line).ok()?;
    if frame.get("id").and_then(Value::as_u64) != Some(id) || frame.get("method").is_some() {
        return None;
    }

    if let Some(error) = frame.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Some(Err(CouncilError::protocol(message.to_string())));
    }

    let result = frame.get("result").cloned().unwrap_or(Value::Null);
    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        let detail = result
            .get("content")
            .and_then(Value::as_array)
            .and_then(|items| items.iter().find_map(|i| i.get("text").and_then(Value::as_str)))
            .unwrap_or("tool reported an error");
        return Some(Err(CouncilError::protocol(detail.to_string())));
    }
    Some(Ok(result))
}

#[async_trait]
impl RemoteConnection for StdioConnection {
    async fn call(&mut self, method: &str, arguments: &Map<String, Value>) -> Result<Value> {
        self.request("tools/call", json!({ "name": method, "arguments": arguments }))
            .await
    }

    async fn cancel_in_flight(&mut self) {
        let Some(id) = self.in_flight.take() else { return };
        let params = json!({ "requestId": id, "reason": "deadline exceeded or cancelled" });
        if let Err(e) = self.notify("notifications/cancelled", params).await {
            warn!(server_id = %self.server_id, error = %e, "failed to send cancellation");
        }
    }

    fn is_alive(&mut self) -> bool {
        self.stdin.is_some() && matches!(self.child.try_wait(), Ok(None))
    }

    async fn close(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
        let _ = self.child.kill().await;
        debug!(server_id = %self.server_id, "tool server stopped");
    }
}
