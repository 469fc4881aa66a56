//! LLM Provider Traits and Types
//!
//! The orchestrator hands a provider the full transcript plus the tool
//! declarations and gets back one reply: an ordered list of text and
//! tool-call parts.

use async_trait::async_trait;
use qb_core::{Part, ProviderError, ToolDeclaration, Turn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderType {
    Gemini,
    /// Scripted or in-process providers
    Custom(String),
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::Gemini => write!(f, "gemini"),
            ProviderType::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// One model invocation
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub turns: &'a [Turn],
    /// Empty means no tools are offered
    pub tools: &'a [ToolDeclaration],
}

impl<'a> ModelRequest<'a> {
    pub fn new(turns: &'a [Turn], tools: &'a [ToolDeclaration]) -> Self {
        Self { turns, tools }
    }
}

/// Token usage information
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Model reply. Parts are `Part::Text` or `Part::ToolCall`, in reply order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub parts: Vec<Part>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl ModelReply {
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            parts,
            ..Default::default()
        }
    }

    /// Reply holding a single text part
    pub fn text(content: impl Into<String>) -> Self {
        Self::from_parts(vec![Part::text(content)])
    }

    pub fn has_tool_calls(&self) -> bool {
        self.parts.iter().any(Part::is_tool_call)
    }
}

/// LLM Provider trait
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get provider type
    fn provider_type(&self) -> ProviderType;

    /// Model identifier used for every request
    fn model(&self) -> &str;

    /// Invoke the model once. Implementations must not retry.
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ProviderError>;
}
