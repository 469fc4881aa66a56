//! Tool peer connection over stdio
//!
//! Spawns the peer process, performs the MCP `initialize` handshake and
//! then exchanges newline-delimited JSON-RPC messages over the child's
//! stdin/stdout. One exchange at a time: the pipes sit behind a mutex so
//! concurrent queries serialize on the single channel.

use async_trait::async_trait;
use qb_core::{ConnectError, PeerError};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::peer::ToolPeer;
use crate::protocol::{
    CallToolResult, ListToolsResult, McpMessage, McpNotification, McpRequest, McpResponse,
    PeerTool, PROTOCOL_VERSION,
};

/// Default time allowed for spawn + `initialize`
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How to launch the tool peer
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Extra environment variables for the peer process
    pub env: HashMap<String, String>,
    pub handshake_timeout: Duration,
}

impl PeerConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

struct PeerIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Live connection to a stdio MCP peer
pub struct McpConnection {
    config: PeerConfig,
    child: Mutex<Option<Child>>,
    io: Mutex<Option<PeerIo>>,
    connected: AtomicBool,
    next_id: AtomicU64,
    server_info: Option<Value>,
}

impl McpConnection {
    /// Spawn the peer and complete the `initialize` handshake.
    ///
    /// On any failure the child is killed before the error is returned.
    pub async fn open(config: PeerConfig) -> Result<Self, ConnectError> {
        info!("Starting tool peer: {} {:?}", config.command, config.args);

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|source| ConnectError::Spawn {
            command: config.command.clone(),
            source,
        })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.start_kill();
                return Err(ConnectError::Handshake(PeerError::protocol(
                    "peer stdio pipes unavailable",
                )));
            }
        };

        let handshake_timeout = config.handshake_timeout;
        let mut connection = Self {
            config,
            child: Mutex::new(Some(child)),
            io: Mutex::new(Some(PeerIo {
                stdin,
                stdout: BufReader::new(stdout),
            })),
            connected: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            server_info: None,
        };

        let handshake = tokio::time::timeout(handshake_timeout, connection.initialize()).await;
        match handshake {
            Ok(Ok(server_info)) => {
                connection.server_info = Some(server_info);
                info!("Tool peer initialized: {}", connection.config.command);
                Ok(connection)
            }
            Ok(Err(e)) => {
                connection.close().await;
                Err(ConnectError::Handshake(e))
            }
            Err(_) => {
                connection.close().await;
                Err(ConnectError::Timeout(handshake_timeout))
            }
        }
    }

    async fn initialize(&self) -> Result<Value, PeerError> {
        let result = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION")
                    }
                })),
            )
            .await?;

        debug!("Peer initialize result: {}", result);
        self.notify("notifications/initialized").await?;
        Ok(result)
    }

    /// `serverInfo` and capabilities reported during the handshake
    pub fn server_info(&self) -> Option<&Value> {
        self.server_info.as_ref()
    }

    /// Release the child process and pipes. Idempotent.
    pub async fn close(&self) {
        let was_connected = self.connected.swap(false, Ordering::SeqCst);
        self.io.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            info!("Stopping tool peer: {}", self.config.command);
            if let Err(e) = child.kill().await {
                debug!("Tool peer already exited: {}", e);
            }
        } else if was_connected {
            debug!("Tool peer process already released");
        }
    }

    /// Send one request and wait for its response.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, PeerError> {
        if !self.is_connected() {
            return Err(PeerError::NotConnected);
        }

        let mut guard = self.io.lock().await;
        let io = guard.as_mut().ok_or(PeerError::NotConnected)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = McpRequest::new(id, method, params);
        debug!("Sending {} (id={}) to {}", method, id, self.config.command);

        let result = match write_message(&mut io.stdin, &request).await {
            Ok(()) => read_response(&mut io.stdout, &mut io.stdin, id).await,
            Err(e) => Err(e),
        };

        if matches!(result, Err(PeerError::Closed) | Err(PeerError::Io(_))) {
            warn!("Tool peer channel failed, marking connection closed");
            self.connected.store(false, Ordering::SeqCst);
        }

        result
    }

    async fn notify(&self, method: &str) -> Result<(), PeerError> {
        let mut guard = self.io.lock().await;
        let io = guard.as_mut().ok_or(PeerError::NotConnected)?;
        write_message(&mut io.stdin, &McpNotification::new(method)).await
    }
}

#[async_trait]
impl ToolPeer for McpConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn list_tools(&self) -> Result<Vec<PeerTool>, PeerError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if next.is_empty() => break,
                Some(next) if !seen_cursors.insert(next.clone()) => {
                    warn!("Peer repeated tools/list cursor {}, stopping pagination", next);
                    break;
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, PeerError> {
        let result = self
            .request(
                "tools/call",
                Some(json!({
                    "name": name,
                    "arguments": arguments
                })),
            )
            .await?;

        Ok(serde_json::from_value(result)?)
    }
}

impl Drop for McpConnection {
    fn drop(&mut self) {
        if let Some(child) = self.child.get_mut().as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Write one JSON message followed by a newline.
async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), PeerError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let line = serde_json::to_string(message)?;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Read lines until the response to `id` arrives.
///
/// A `ping` from the peer is answered on `writer`. Notifications, other
/// server-initiated requests, stale responses and non-JSON lines are skipped.
async fn read_response<R, W>(reader: &mut R, writer: &mut W, id: u64) -> Result<Value, PeerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(PeerError::Closed);
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let message: McpMessage = match serde_json::from_str(trimmed) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring non-JSON-RPC line from peer: {} ({})", trimmed, e);
                continue;
            }
        };

        if message.is_request() {
            match (message.method.as_deref(), message.id) {
                (Some("ping"), Some(ping_id)) => {
                    debug!("Answering peer ping while waiting for id={}", id);
                    write_message(writer, &McpResponse::new(ping_id, json!({}))).await?;
                }
                _ => warn!("Ignoring peer request while waiting for id={}: {}", id, trimmed),
            }
            continue;
        }

        if !message.is_response_to(id) {
            debug!("Skipping peer message while waiting for id={}: {}", id, trimmed);
            continue;
        }

        if let Some(error) = message.error {
            return Err(PeerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        return Ok(message.result.unwrap_or(Value::Null));
    }
}
