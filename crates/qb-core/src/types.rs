//! Transcript data model
//!
//! A query's conversation is a [`Transcript`] of [`Turn`]s, each carrying an
//! ordered list of [`Part`]s. Model turns may mix text and tool calls; tool
//! results from one iteration travel together in a single turn.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Default cap on model-invoke / tool-dispatch cycles per query.
pub const MAX_ITERATIONS: usize = 5;

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
    /// Submitter-side turn carrying tool results back to the model
    ToolResult,
}

impl Role {
    /// Submitter turns are the ones the model replies to.
    pub fn is_submitter(&self) -> bool {
        matches!(self, Role::User | Role::ToolResult)
    }
}

/// Result of dispatching a single tool call.
///
/// Both variants are fed back to the model; an `Err` never aborts the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Ok(Value),
    Err(String),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Err(_))
    }

    /// Payload as presented to the model and in trace lines.
    pub fn payload(&self) -> Value {
        match self {
            ToolOutcome::Ok(value) => value.clone(),
            ToolOutcome::Err(message) => json!({ "error": message }),
        }
    }
}

/// One atomic unit of content within a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    Text {
        content: String,
    },
    ToolCall {
        name: String,
        arguments: Map<String, Value>,
    },
    ToolResult {
        name: String,
        result: ToolOutcome,
    },
}

impl Part {
    pub fn text(content: impl Into<String>) -> Self {
        Part::Text {
            content: content.into(),
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Part::ToolCall {
            name: name.into(),
            arguments,
        }
    }

    pub fn tool_result(name: impl Into<String>, result: ToolOutcome) -> Self {
        Part::ToolResult {
            name: name.into(),
            result,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { content } => Some(content),
            _ => None,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Part::ToolCall { .. })
    }
}

/// One entry in the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    /// Submitter turn holding a single text part
    pub fn user_text(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(content)],
        }
    }

    /// Model turn, parts kept in reply order
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// Submitter turn batching every tool result of one iteration
    pub fn tool_results(parts: Vec<Part>) -> Self {
        Self {
            role: Role::ToolResult,
            parts,
        }
    }
}

/// Ordered, append-only conversation history for a single query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

/// Provider-facing description of a callable tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// Sanitized JSON-schema object
    pub parameters: Value,
}
