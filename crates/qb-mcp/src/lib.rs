//! qb-mcp: MCP client side for querybridge
//!
//! - `connection`: stdio connection lifecycle (spawn, handshake, close)
//! - `peer`: the `ToolPeer` trait the rest of the workspace depends on
//! - `schema`: input schema sanitizer for function-calling providers
//! - `registry`: peer tool list -> provider-ready declarations
//! - `dispatch`: single tool call execution and result normalization
//!
//! ```rust,ignore
//! use qb_mcp::prelude::*;
//!
//! let connection = Arc::new(McpConnection::open(PeerConfig::new("python").with_args(["server.py"])).await?);
//! let registry = ToolRegistry::new(connection.clone());
//! let declarations = registry.list_declarations().await?;
//! ```

pub mod connection;
pub mod dispatch;
pub mod peer;
pub mod protocol;
pub mod registry;
pub mod schema;

// Re-exports
pub use connection::{McpConnection, PeerConfig};
pub use dispatch::ToolDispatcher;
pub use peer::ToolPeer;
pub use protocol::{CallToolResult, ContentItem, PeerTool};
pub use registry::ToolRegistry;
pub use schema::sanitize_schema;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        sanitize_schema, CallToolResult, McpConnection, PeerConfig, PeerTool, ToolDispatcher,
        ToolPeer, ToolRegistry,
    };
}
