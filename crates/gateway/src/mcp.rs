//! MCP client session over line-delimited JSON-RPC, either on a spawned
//! server's stdio or on any reader/writer pair.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{error_marker, GatewayError, ToolDescriptor};

pub const MCP_PROTOCOL_VERSION: &str = "2025-06-18";
const CLIENT_NAME: &str = "flightdesk-bridge";
const SERVER_EXIT_GRACE: Duration = Duration::from_secs(1);

/// How to launch an MCP server speaking on its stdio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl McpCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[derive(Default)]
struct Inflight {
    waiting: HashMap<u64, oneshot::Sender<Value>>,
    closed: bool,
}

pub struct McpClient {
    outbound: mpsc::UnboundedSender<String>,
    inflight: Arc<Mutex<Inflight>>,
    next_id: AtomicU64,
    timeout: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl McpClient {
    /// Launches the server and runs the `initialize` handshake. The child is
    /// killed if the client is dropped without [`shutdown`](Self::shutdown).
    pub async fn spawn(command: &McpCommand, timeout: Duration) -> Result<Self, GatewayError> {
        let connect_error = |message: String| GatewayError::Connect {
            path: command.program.clone(),
            message,
        };

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| connect_error(error.to_string()))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(connect_error("server stdio was not captured".to_string()));
        };

        let client = Self::attach(BufReader::new(stdout), stdin, timeout, Some(child));
        client.initialize().await?;
        Ok(client)
    }

    /// Runs the handshake over an already open stream pair.
    pub async fn connect<R, W>(reader: R, writer: W, timeout: Duration) -> Result<Self, GatewayError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let client = Self::attach(reader, writer, timeout, None);
        client.initialize().await?;
        Ok(client)
    }

    fn attach<R, W>(reader: R, mut writer: W, timeout: Duration, child: Option<Child>) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, mut queue) = mpsc::unbounded_channel::<String>();
        let inflight = Arc::new(Mutex::new(Inflight::default()));

        let writer_task = tokio::spawn(async move {
            while let Some(mut line) = queue.recv().await {
                line.push('\n');
                if let Err(error) = writer.write_all(line.as_bytes()).await {
                    warn!(%error, "mcp write failed");
                    break;
                }
                if let Err(error) = writer.flush().await {
                    warn!(%error, "mcp flush failed");
                    break;
                }
            }
        });
        let reader_task = tokio::spawn(read_responses(reader, Arc::clone(&inflight)));

        Self {
            outbound,
            inflight,
            next_id: AtomicU64::new(1),
            timeout,
            tasks: Mutex::new(vec![writer_task, reader_task]),
            child: tokio::sync::Mutex::new(child),
        }
    }

    async fn initialize(&self) -> Result<(), GatewayError> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION") },
                }),
            )
            .await?;

        let server = result
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let protocol = result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(server, protocol, "mcp session initialized");

        self.notify("notifications/initialized", json!({}))
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError> {
        let result = self.request("tools/list", json!({})).await?;
        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .map(|tools| {
                tools
                    .iter()
                    .filter_map(|tool| {
                        Some(ToolDescriptor {
                            name: tool.get("name")?.as_str()?.to_string(),
                            description: tool
                                .get("description")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(tools)
    }

    /// `tools/call`: text content items are joined and read back as JSON.
    /// `isError` results and `{ "error": ... }` payloads become
    /// [`GatewayError::Backend`].
    pub async fn call_tool(&self, tool: &str, args: Value) -> Result<Value, GatewayError> {
        let result = self
            .request("tools/call", json!({ "name": tool, "arguments": args }))
            .await?;

        let text: String = result
            .get("content")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("text").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => value,
                Err(_) => Value::String(text),
            }
        };

        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if let Some(message) = error_marker(&value) {
            return Err(GatewayError::Backend(message));
        }
        if is_error {
            let message = match value {
                Value::String(message) => message,
                other => other.to_string(),
            };
            return Err(GatewayError::Backend(message));
        }
        Ok(value)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut inflight = self.inflight.lock();
            if inflight.closed {
                return Err(session_closed(method));
            }
            inflight.waiting.insert(id, reply_tx);
        }

        let message = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        if self.outbound.send(message.to_string()).is_err() {
            self.inflight.lock().waiting.remove(&id);
            return Err(session_closed(method));
        }

        let response = match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(session_closed(method)),
            Err(_) => {
                self.inflight.lock().waiting.remove(&id);
                return Err(GatewayError::Timeout {
                    path: method.to_string(),
                });
            }
        };

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(GatewayError::Backend(message));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    fn notify(&self, method: &str, params: Value) -> Result<(), GatewayError> {
        let message = json!({ "jsonrpc": "2.0", "method": method, "params": params });
        self.outbound
            .send(message.to_string())
            .map_err(|_| session_closed(method))
    }

    /// Closes the server's stdin and waits briefly for it to exit, then kills
    /// it. Idempotent.
    pub async fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.inflight.lock().closed = true;

        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };
        match tokio::time::timeout(SERVER_EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "mcp server exited"),
            Ok(Err(error)) => warn!(%error, "waiting on mcp server failed"),
            Err(_) => {
                warn!("mcp server did not exit after stdin closed; killing it");
                if let Err(error) = child.kill().await {
                    warn!(%error, "could not kill mcp server");
                }
            }
        }
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

fn session_closed(method: &str) -> GatewayError {
    GatewayError::Connect {
        path: method.to_string(),
        message: "mcp session is closed".to_string(),
    }
}

/// Routes responses to their waiting requests until the stream ends, then
/// fails everything still in flight.
async fn read_responses<R>(reader: R, inflight: Arc<Mutex<Inflight>>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let message: Value = match serde_json::from_str(&line) {
                    Ok(message) => message,
                    Err(error) => {
                        warn!(%error, "unparseable mcp message");
                        continue;
                    }
                };
                let Some(id) = message.get("id").and_then(Value::as_u64) else {
                    debug!("ignoring mcp message without a request id");
                    continue;
                };
                match inflight.lock().waiting.remove(&id) {
                    Some(reply) => {
                        let _ = reply.send(message);
                    }
                    None => debug!(id, "mcp response for an abandoned request"),
                }
            }
            Ok(None) => break,
            Err(error) => {
                warn!(%error, "mcp read failed");
                break;
            }
        }
    }

    debug!("mcp server closed its output");
    let mut inflight = inflight.lock();
    inflight.closed = true;
    inflight.waiting.clear();
}
