use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::mcp::{McpClient, McpCommand};
use crate::{GatewayError, ToolClient};

pub const BRIDGE_CALL_TIMEOUT: Duration = Duration::from_secs(15);
pub const BRIDGE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("tool bridge failed to start: {0}")]
    Startup(String),
    #[error("tool '{tool}' did not answer within {seconds}s")]
    Timeout { tool: String, seconds: u64 },
    #[error("tool bridge is closed")]
    Closed,
    #[error(transparent)]
    Tool(#[from] GatewayError),
}

/// Where the bridge sends tool calls: the HTTP tool service, or an MCP
/// server spawned as a child process and spoken to over its stdio.
#[derive(Debug, Clone)]
pub enum BridgeTransport {
    Http(ToolClient),
    McpStdio(McpCommand),
}

impl From<ToolClient> for BridgeTransport {
    fn from(client: ToolClient) -> Self {
        Self::Http(client)
    }
}

impl From<McpCommand> for BridgeTransport {
    fn from(command: McpCommand) -> Self {
        Self::McpStdio(command)
    }
}

#[derive(Clone)]
enum Connection {
    Http(ToolClient),
    Mcp(Arc<McpClient>),
}

impl Connection {
    /// HTTP connections are checked with `ping`; MCP ones with the
    /// `initialize` handshake.
    async fn open(transport: BridgeTransport, call_timeout: Duration) -> Result<Self, GatewayError> {
        match transport {
            BridgeTransport::Http(client) => {
                client.call("ping", json!({})).await?;
                Ok(Self::Http(client))
            }
            BridgeTransport::McpStdio(command) => {
                let client = McpClient::spawn(&command, call_timeout).await?;
                Ok(Self::Mcp(Arc::new(client)))
            }
        }
    }

    async fn call(&self, tool: &str, args: Value) -> Result<Value, GatewayError> {
        match self {
            Self::Http(client) => client.call(tool, args).await,
            Self::Mcp(client) => client.call_tool(tool, args).await,
        }
    }

    async fn close(&self) {
        if let Self::Mcp(client) = self {
            client.shutdown().await;
        }
    }
}

struct BridgeRequest {
    tool: String,
    args: Value,
    reply: std_mpsc::Sender<Result<Value, GatewayError>>,
}

/// Blocking facade over a [`BridgeTransport`]. A dedicated thread owns a
/// current-thread runtime; callers hand it requests and wait on a plain
/// channel, so this type is usable from code that is not async.
pub struct ToolBridge {
    requests: mpsc::UnboundedSender<BridgeRequest>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    finished: Mutex<std_mpsc::Receiver<()>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    call_timeout: Duration,
}

impl ToolBridge {
    pub fn start(transport: impl Into<BridgeTransport>) -> Result<Self, BridgeError> {
        Self::start_with_timeout(transport, BRIDGE_CALL_TIMEOUT)
    }

    /// Spawns the worker and blocks until the transport's handshake completes.
    pub fn start_with_timeout(
        transport: impl Into<BridgeTransport>,
        call_timeout: Duration,
    ) -> Result<Self, BridgeError> {
        let transport = transport.into();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (finished_tx, finished_rx) = std_mpsc::channel();

        let worker = thread::Builder::new()
            .name("flightdesk-tool-bridge".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(error) => {
                        let _ = ready_tx.send(Err(error.to_string()));
                        return;
                    }
                };

                runtime.block_on(run_worker(
                    transport,
                    call_timeout,
                    request_rx,
                    shutdown_rx,
                    ready_tx,
                ));
                let _ = finished_tx.send(());
            })
            .map_err(|error| BridgeError::Startup(error.to_string()))?;

        let bridge = Self {
            requests: request_tx,
            shutdown: Mutex::new(Some(shutdown_tx)),
            finished: Mutex::new(finished_rx),
            worker: Mutex::new(Some(worker)),
            call_timeout,
        };

        match ready_rx.recv_timeout(call_timeout) {
            Ok(Ok(())) => {
                info!("tool bridge connected");
                Ok(bridge)
            }
            Ok(Err(message)) => Err(BridgeError::Startup(message)),
            Err(std_mpsc::RecvTimeoutError::Timeout) => Err(BridgeError::Startup(format!(
                "handshake did not complete within {}s",
                call_timeout.as_secs()
            ))),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => Err(BridgeError::Startup(
                "worker exited before the handshake".to_string(),
            )),
        }
    }

    /// Blocks until the tool answers or the call ceiling passes. A call that
    /// times out keeps running on the worker; its late answer is dropped.
    pub fn call_tool(&self, tool: &str, args: Value) -> Result<Value, BridgeError> {
        let (reply_tx, reply_rx) = std_mpsc::channel();
        self.requests
            .send(BridgeRequest {
                tool: tool.to_string(),
                args,
                reply: reply_tx,
            })
            .map_err(|_| BridgeError::Closed)?;

        match reply_rx.recv_timeout(self.call_timeout) {
            Ok(result) => Ok(result?),
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                warn!(tool, "tool call exceeded bridge ceiling");
                Err(BridgeError::Timeout {
                    tool: tool.to_string(),
                    seconds: self.call_timeout.as_secs(),
                })
            }
            Err(std_mpsc::RecvTimeoutError::Disconnected) => Err(BridgeError::Closed),
        }
    }

    /// Signals the worker and waits up to [`BRIDGE_SHUTDOWN_TIMEOUT`] for it.
    /// A spawned MCP server is stopped before the worker exits. Idempotent.
    pub fn close(&self) {
        let Some(shutdown) = self.shutdown.lock().take() else {
            return;
        };
        let _ = shutdown.send(());

        let finished = match self.finished.lock().recv_timeout(BRIDGE_SHUTDOWN_TIMEOUT) {
            Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => true,
            Err(std_mpsc::RecvTimeoutError::Timeout) => false,
        };

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        if finished {
            if worker.join().is_err() {
                warn!("tool bridge worker panicked");
            }
            debug!("tool bridge closed");
        } else {
            warn!(
                seconds = BRIDGE_SHUTDOWN_TIMEOUT.as_secs(),
                "tool bridge worker did not stop in time; detaching"
            );
        }
    }
}

impl Drop for ToolBridge {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_worker(
    transport: BridgeTransport,
    call_timeout: Duration,
    mut requests: mpsc::UnboundedReceiver<BridgeRequest>,
    mut shutdown: oneshot::Receiver<()>,
    ready: std_mpsc::Sender<Result<(), String>>,
) {
    let connection = match Connection::open(transport, call_timeout).await {
        Ok(connection) => connection,
        Err(error) => {
            let _ = ready.send(Err(error.to_string()));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        connection.close().await;
        return;
    }

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            request = requests.recv() => {
                let Some(request) = request else { break };
                let connection = connection.clone();
                tokio::spawn(async move {
                    let result = connection.call(&request.tool, request.args).await;
                    let _ = request.reply.send(result);
                });
            }
        }
    }

    connection.close().await;
}
