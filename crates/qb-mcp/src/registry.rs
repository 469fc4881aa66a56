//! Tool Registry Adapter
//!
//! Turns the peer's live tool list into provider-ready declarations. Nothing
//! is cached: the peer may add or drop tools between queries, so callers
//! fetch a fresh list per query.

use qb_core::{PeerError, ToolDeclaration};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::peer::ToolPeer;
use crate::protocol::PeerTool;
use crate::schema::sanitize_schema;

/// Discovers tools from the peer and sanitizes their schemas
#[derive(Clone)]
pub struct ToolRegistry {
    peer: Arc<dyn ToolPeer>,
}

impl ToolRegistry {
    pub fn new(peer: Arc<dyn ToolPeer>) -> Self {
        Self { peer }
    }

    /// One declaration per peer tool, in the peer's order
    pub async fn list_declarations(&self) -> Result<Vec<ToolDeclaration>, PeerError> {
        let declarations: Vec<_> = self
            .peer
            .list_tools()
            .await?
            .into_iter()
            .map(to_declaration)
            .collect();
        debug!("Peer tools: {:?}", declaration_names(&declarations));
        Ok(declarations)
    }
}

/// Build a declaration; a missing or null schema becomes `{}`.
pub fn to_declaration(tool: PeerTool) -> ToolDeclaration {
    let parameters = match tool.input_schema {
        Some(schema) if !schema.is_null() => sanitize_schema(&schema),
        _ => json!({}),
    };

    ToolDeclaration {
        name: tool.name,
        description: tool.description.unwrap_or_default(),
        parameters,
    }
}

/// Names of the declared tools, for logging
pub fn declaration_names(declarations: &[ToolDeclaration]) -> Vec<&str> {
    declarations.iter().map(|d| d.name.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CallToolResult;
    use async_trait::async_trait;
    use serde_json::{Map, Value};

    struct ListingPeer {
        tools: Vec<PeerTool>,
    }

    #[async_trait]
    impl ToolPeer for ListingPeer {
        fn is_connected(&self) -> bool {
            true
        }

        async fn list_tools(&self) -> Result<Vec<PeerTool>, PeerError> {
            Ok(self.tools.clone())
        }

        async fn call_tool(
            &self,
            _name: &str,
            _arguments: Map<String, Value>,
        ) -> Result<CallToolResult, PeerError> {
            Err(PeerError::protocol("not used"))
        }
    }

    fn tool(name: &str, schema: Option<Value>) -> PeerTool {
        PeerTool {
            name: name.to_string(),
            description: Some(format!("{name} tool")),
            input_schema: schema,
        }
    }

    #[tokio::test]
    async fn test_declarations_keep_peer_order() {
        let peer = ListingPeer {
            tools: vec![
                tool("list_collections", None),
                tool("aggregate_documents", Some(json!({"type": "object"}))),
                tool("count_documents", Some(json!({"type": "object"}))),
            ],
        };
        let registry = ToolRegistry::new(Arc::new(peer));

        let declarations = registry.list_declarations().await.unwrap();
        assert_eq!(
            declaration_names(&declarations),
            vec!["list_collections", "aggregate_documents", "count_documents"]
        );
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let registry = ToolRegistry::new(Arc::new(ListingPeer { tools: vec![] }));
        assert!(registry.list_declarations().await.unwrap().is_empty());
    }

    #[test]
    fn test_missing_schema_becomes_empty_object() {
        assert_eq!(to_declaration(tool("a", None)).parameters, json!({}));
        assert_eq!(to_declaration(tool("b", Some(Value::Null))).parameters, json!({}));
    }

    #[test]
    fn test_schema_is_sanitized() {
        let declaration = to_declaration(PeerTool {
            name: "count_documents".to_string(),
            description: None,
            input_schema: Some(json!({
                "type": "object",
                "title": "count_documentsArguments",
                "properties": {"collection": {"type": "string", "title": "Collection"}},
                "required": ["collection", "filter_json"]
            })),
        });

        assert_eq!(declaration.description, "");
        assert_eq!(
            declaration.parameters,
            json!({
                "type": "object",
                "properties": {"collection": {"type": "string"}},
                "required": ["collection"]
            })
        );
    }
}
