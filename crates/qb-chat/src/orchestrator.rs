//! Conversation Orchestrator
//!
//! Drives one query through the model-invoke / tool-dispatch cycle:
//!
//! 1. Seed the transcript with the query
//! 2. Fetch fresh tool declarations from the peer
//! 3. Invoke the model, record its reply as one model turn
//! 4. Dispatch every requested tool call, batch the results into one turn
//! 5. Repeat until the model stops calling tools or the iteration cap is hit
//!
//! Provider and tool failures are folded into the answer text. Only a
//! disconnected peer is reported as an error.

use qb_core::{
    OrchestratorError, Part, ToolDeclaration, Transcript, Turn, MAX_ITERATIONS,
};
use qb_llm::{LlmProvider, ModelRequest};
use qb_mcp::{ToolDispatcher, ToolPeer, ToolRegistry};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

const EMPTY_REPLY_NOTICE: &str = "No response from model.";

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum model-invoke / tool-dispatch cycles per query
    pub max_iterations: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
        }
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Model replied without requesting tools
    Completed,
    /// Model reply had no parts
    EmptyReply,
    /// Model invocation failed
    ProviderError,
    /// Every iteration ended with tool calls
    IterationCapReached,
}

/// Result of one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub termination: TerminationReason,
    /// Model invocations made, including a failed one
    pub iterations: usize,
    pub transcript_len: usize,
}

/// Tool-augmented conversation orchestrator.
///
/// Holds no per-query state; concurrent `answer` calls each own their
/// transcript and share the peer channel.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    peer: Arc<dyn ToolPeer>,
    registry: ToolRegistry,
    dispatcher: ToolDispatcher,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn LlmProvider>, peer: Arc<dyn ToolPeer>) -> Self {
        Self {
            registry: ToolRegistry::new(peer.clone()),
            dispatcher: ToolDispatcher::new(peer.clone()),
            provider,
            peer,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.peer.is_connected()
    }

    /// Answer a query, returning the accumulated text.
    pub async fn answer(&self, query: &str) -> Result<String, OrchestratorError> {
        self.answer_detailed(query).await.map(|answer| answer.text)
    }

    /// Answer a query, also reporting how the loop terminated.
    pub async fn answer_detailed(&self, query: &str) -> Result<Answer, OrchestratorError> {
        if !self.peer.is_connected() {
            warn!("Query rejected: not connected to tool peer");
            return Err(OrchestratorError::NotConnected);
        }

        let query_id = uuid::Uuid::new_v4();
        let span = info_span!("query", %query_id);
        Ok(self.run(query).instrument(span).await)
    }

    async fn run(&self, query: &str) -> Answer {
        let mut transcript = Transcript::new();
        transcript.push(Turn::user_text(query));

        let declarations = self.fetch_declarations().await;
        info!(
            "Processing query: provider={}, model={}, tools={}",
            self.provider.provider_type(),
            self.provider.model(),
            declarations.len()
        );
        debug!("Query: {}", query);

        let mut text = String::new();
        let mut iterations = 0;

        let termination = loop {
            if iterations >= self.config.max_iterations {
                warn!(
                    "Max iterations ({}) reached, returning accumulated text",
                    self.config.max_iterations
                );
                break TerminationReason::IterationCapReached;
            }
            iterations += 1;

            let request = ModelRequest::new(transcript.turns(), &declarations);
            let reply = match self.provider.generate(request).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!(iteration = iterations, "Model provider failed: {}", e);
                    text.push_str(&format!("Error from model provider: {}", e));
                    break TerminationReason::ProviderError;
                }
            };

            if reply.parts.is_empty() {
                warn!(iteration = iterations, "Model returned no parts");
                text.push_str(EMPTY_REPLY_NOTICE);
                text.push('\n');
                break TerminationReason::EmptyReply;
            }

            let calls = tool_calls(&reply.parts);
            for part in &reply.parts {
                if let Some(content) = part.as_text() {
                    text.push_str(content);
                    text.push('\n');
                }
            }
            transcript.push(Turn::model(reply.parts));

            if calls.is_empty() {
                debug!(iteration = iterations, "No tool calls, done");
                break TerminationReason::Completed;
            }

            info!(iteration = iterations, "Model requested {} tool calls", calls.len());
            let mut results = Vec::with_capacity(calls.len());
            for (name, arguments) in calls {
                let outcome = self.dispatcher.invoke(&name, &arguments).await;
                text.push_str(&format!(
                    "[Tool result from {}: {}]\n",
                    name,
                    outcome.payload()
                ));
                results.push(Part::tool_result(name, outcome));
            }
            transcript.push(Turn::tool_results(results));
        };

        info!(
            "Query finished: termination={:?}, iterations={}, turns={}",
            termination,
            iterations,
            transcript.len()
        );

        Answer {
            text: text.trim().to_string(),
            termination,
            iterations,
            transcript_len: transcript.len(),
        }
    }

    async fn fetch_declarations(&self) -> Vec<ToolDeclaration> {
        match self.registry.list_declarations().await {
            Ok(declarations) => declarations,
            Err(e) => {
                warn!("Failed to list tools, continuing without tools: {}", e);
                Vec::new()
            }
        }
    }
}

fn tool_calls(parts: &[Part]) -> Vec<(String, Map<String, Value>)> {
    parts
        .iter()
        .filter_map(|part| match part {
            Part::ToolCall { name, arguments } => Some((name.clone(), arguments.clone())),
            _ => None,
        })
        .collect()
}
