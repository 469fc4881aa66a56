//! qb-llm: model provider integration
//!
//! - `provider`: the `LlmProvider` trait, request and reply types
//! - `gemini`: Google Gemini `generateContent` with function calling

pub mod gemini;
pub mod provider;

pub use gemini::{GeminiClient, GeminiConfig};
pub use provider::{LlmProvider, ModelReply, ModelRequest, ProviderType, TokenUsage};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{GeminiClient, GeminiConfig, LlmProvider, ModelReply, ModelRequest};
}
