//! Tool peer abstraction
//!
//! The orchestrator, registry adapter and dispatcher only ever see this
//! trait; `McpConnection` is the production implementation.

use async_trait::async_trait;
use qb_core::PeerError;
use serde_json::{Map, Value};

use crate::protocol::{CallToolResult, PeerTool};

/// Request/response channel to the process that owns and executes tools
#[async_trait]
pub trait ToolPeer: Send + Sync {
    /// Whether the channel is open and handshaken
    fn is_connected(&self) -> bool;

    /// Current tool list, in the peer's order
    async fn list_tools(&self) -> Result<Vec<PeerTool>, PeerError>;

    /// Execute one tool call
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, PeerError>;
}
