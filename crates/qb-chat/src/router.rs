//! Query Router - HTTP endpoints for the orchestrator
//!
//! Route definitions only. Middleware and the server loop live in the
//! service binary.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use qb_core::OrchestratorError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::orchestrator::Orchestrator;

/// Create the query router
pub fn create_router(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/query", post(query_handler))
        .route("/health", get(health_handler))
        .with_state(orchestrator)
}

// === Handlers ===

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub response: String,
}

async fn query_handler(
    State(orchestrator): State<Orchestrator>,
    Json(request): Json<QueryRequest>,
) -> Response {
    match orchestrator.answer_detailed(&request.query).await {
        Ok(answer) => {
            debug!(
                "Answer ready: termination={:?}, iterations={}",
                answer.termination, answer.iterations
            );
            Json(QueryResponse {
                response: answer.text,
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

fn error_response(error: OrchestratorError) -> Response {
    let status = match error {
        OrchestratorError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

async fn health_handler(State(orchestrator): State<Orchestrator>) -> impl IntoResponse {
    let connected = orchestrator.is_connected();
    Json(json!({
        "status": if connected { "healthy" } else { "degraded" },
        "service": "querybridge",
        "peer_connected": connected
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use qb_core::{PeerError, ProviderError};
    use qb_llm::{LlmProvider, ModelReply, ModelRequest, ProviderType};
    use qb_mcp::{CallToolResult, PeerTool, ToolPeer};
    use serde_json::{Map, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct FixedProvider;

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn provider_type(&self) -> ProviderType {
            ProviderType::Custom("fixed".to_string())
        }

        fn model(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ProviderError> {
            let query = request.turns[0].parts[0].as_text().unwrap_or_default();
            Ok(ModelReply::text(format!("You asked: {query}")))
        }
    }

    struct StaticPeer {
        connected: bool,
    }

    #[async_trait]
    impl ToolPeer for StaticPeer {
        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn list_tools(&self) -> Result<Vec<PeerTool>, PeerError> {
            Ok(vec![])
        }

        async fn call_tool(
            &self,
            _name: &str,
            _arguments: Map<String, Value>,
        ) -> Result<CallToolResult, PeerError> {
            Err(PeerError::NotConnected)
        }
    }

    fn app(connected: bool) -> Router {
        create_router(Orchestrator::new(
            Arc::new(FixedProvider),
            Arc::new(StaticPeer { connected }),
        ))
    }

    fn query(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/query")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_query_returns_response() {
        let response = app(true)
            .oneshot(query(r#"{"query": "how many users?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"response": "You asked: how many users?"})
        );
    }

    #[tokio::test]
    async fn test_query_not_connected_is_unavailable() {
        let response = app(false)
            .oneshot(query(r#"{"query": "q"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Not connected to tool peer"})
        );
    }

    #[tokio::test]
    async fn test_query_rejects_missing_field() {
        let response = app(true).oneshot(query(r#"{"q": 1}"#)).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_health_reports_peer_state() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app(false).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["peer_connected"], false);
    }
}
