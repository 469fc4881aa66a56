//! Tool Dispatcher
//!
//! Executes one tool call against the peer and normalizes the result into a
//! [`ToolOutcome`]. Failures never propagate: they come back as
//! `ToolOutcome::Err` so the conversation loop can hand them to the model.

use qb_core::ToolOutcome;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error};

use crate::peer::ToolPeer;
use crate::protocol::CallToolResult;

/// Stateless tool call executor
#[derive(Clone)]
pub struct ToolDispatcher {
    peer: Arc<dyn ToolPeer>,
}

impl ToolDispatcher {
    pub fn new(peer: Arc<dyn ToolPeer>) -> Self {
        Self { peer }
    }

    pub async fn invoke(&self, name: &str, arguments: &Map<String, Value>) -> ToolOutcome {
        match self.peer.call_tool(name, arguments.clone()).await {
            Ok(result) => {
                let outcome = normalize_result(result);
                match &outcome {
                    ToolOutcome::Ok(output) => {
                        let args = Value::Object(arguments.clone());
                        debug!("Tool {} called with args: {}, output: {}", name, args, output)
                    }
                    ToolOutcome::Err(message) => {
                        error!("Tool {} reported an error: {}", name, message)
                    }
                }
                outcome
            }
            Err(e) => {
                error!("Error calling tool {}: {}", name, e);
                ToolOutcome::Err(e.to_string())
            }
        }
    }
}

/// Normalize a peer result.
///
/// - `isError` results become `Err` with the joined text content
/// - textual first item: parsed as JSON, else `{"raw": text}`
/// - anything else: `{"raw": <content as JSON text>}`
pub fn normalize_result(result: CallToolResult) -> ToolOutcome {
    if result.is_error {
        let message = result
            .content
            .iter()
            .filter_map(|item| item.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        return ToolOutcome::Err(if message.is_empty() {
            "Tool reported an error".to_string()
        } else {
            message
        });
    }

    match result.content.first().and_then(|item| item.text.as_deref()) {
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed) => ToolOutcome::Ok(parsed),
            Err(_) => ToolOutcome::Ok(json!({ "raw": text })),
        },
        None => {
            let raw = serde_json::to_string(&result.content).unwrap_or_default();
            ToolOutcome::Ok(json!({ "raw": raw }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ContentItem, PeerTool};
    use async_trait::async_trait;
    use qb_core::PeerError;
    use std::sync::Mutex;

    struct RecordingPeer {
        calls: Mutex<Vec<(String, Map<String, Value>)>>,
        reply: fn() -> Result<CallToolResult, PeerError>,
    }

    #[async_trait]
    impl ToolPeer for RecordingPeer {
        fn is_connected(&self) -> bool {
            true
        }

        async fn list_tools(&self) -> Result<Vec<PeerTool>, PeerError> {
            Ok(vec![])
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: Map<String, Value>,
        ) -> Result<CallToolResult, PeerError> {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments));
            (self.reply)()
        }
    }

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_json_text_is_parsed() {
        let outcome = normalize_result(CallToolResult::text("{\"collections\": [\"users\"]}"));
        assert_eq!(outcome, ToolOutcome::Ok(json!({"collections": ["users"]})));

        let outcome = normalize_result(CallToolResult::text("17"));
        assert_eq!(outcome, ToolOutcome::Ok(json!(17)));
    }

    #[test]
    fn test_plain_text_is_wrapped() {
        let outcome = normalize_result(CallToolResult::text("Error: bad filter"));
        assert_eq!(outcome, ToolOutcome::Ok(json!({"raw": "Error: bad filter"})));
    }

    #[test]
    fn test_non_text_content_is_wrapped() {
        let image = ContentItem {
            kind: Some("image".to_string()),
            text: None,
            extra: args(&[("data", json!("AAA"))]),
        };

        let outcome = normalize_result(CallToolResult {
            content: vec![image],
            is_error: false,
        });
        assert_eq!(
            outcome,
            ToolOutcome::Ok(json!({"raw": "[{\"type\":\"image\",\"data\":\"AAA\"}]"}))
        );

        let empty = normalize_result(CallToolResult::default());
        assert_eq!(empty, ToolOutcome::Ok(json!({"raw": "[]"})));
    }

    #[test]
    fn test_peer_reported_error() {
        let outcome = normalize_result(CallToolResult {
            content: vec![ContentItem::text("collection does not exist")],
            is_error: true,
        });
        assert_eq!(outcome, ToolOutcome::Err("collection does not exist".to_string()));
    }

    #[tokio::test]
    async fn test_invoke_forwards_name_and_arguments() {
        let peer = Arc::new(RecordingPeer {
            calls: Mutex::new(vec![]),
            reply: || Ok(CallToolResult::text("3")),
        });
        let dispatcher = ToolDispatcher::new(peer.clone());

        let arguments = args(&[("collection", json!("users")), ("filter_json", json!("{}"))]);
        let outcome = dispatcher.invoke("count_documents", &arguments).await;

        assert_eq!(outcome, ToolOutcome::Ok(json!(3)));
        let calls = peer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "count_documents");
        assert_eq!(calls[0].1, arguments);
    }

    #[tokio::test]
    async fn test_invoke_with_debug_logging_enabled() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let peer = Arc::new(RecordingPeer {
            calls: Mutex::new(vec![]),
            reply: || Ok(CallToolResult::text("{\"n\": 2}")),
        });
        let dispatcher = ToolDispatcher::new(peer);

        let arguments = args(&[("collection", json!("users"))]);
        let outcome = dispatcher.invoke("count_documents", &arguments).await;
        assert_eq!(outcome, ToolOutcome::Ok(json!({"n": 2})));
    }

    #[tokio::test]
    async fn test_invoke_transport_failure_becomes_error_outcome() {
        let peer = Arc::new(RecordingPeer {
            calls: Mutex::new(vec![]),
            reply: || Err(PeerError::Closed),
        });
        let dispatcher = ToolDispatcher::new(peer);

        let outcome = dispatcher.invoke("find_documents", &Map::new()).await;
        assert_eq!(
            outcome,
            ToolOutcome::Err("Tool peer closed the connection".to_string())
        );
        assert_eq!(
            outcome.payload(),
            json!({"error": "Tool peer closed the connection"})
        );
    }
}
