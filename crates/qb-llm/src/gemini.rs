//! Google Gemini API Client
//!
//! Function-calling client for the `generateContent` endpoint using API key
//! authentication (Google AI Studio).
//!
//! ## Configuration
//!
//! - `GEMINI_API_KEY` or `GOOGLE_API_KEY` (required)
//! - `QB_MODEL` (default `gemini-2.0-flash`)
//! - `QB_MAX_OUTPUT_TOKENS` (default 2000)
//! - `GEMINI_BASE_URL` (default `https://generativelanguage.googleapis.com/v1beta`)
//!
//! Requests are sent once. Rate limiting (429) and every other failure is
//! returned to the caller as a [`ProviderError`].

use async_trait::async_trait;
use qb_core::config::{get_config, get_config_int, get_config_opt};
use qb_core::{Part, ProviderError, Role, ToolDeclaration, Turn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::provider::{LlmProvider, ModelReply, ModelRequest, ProviderType, TokenUsage};

/// Gemini API endpoints
pub mod endpoints {
    /// Google AI Studio (API key mode)
    pub const GOOGLE_AI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

    /// `generateContent` URL for a model
    pub fn generate_content_url(base_url: &str, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        )
    }
}

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const ERROR_PREVIEW_CHARS: usize = 1000;

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub base_url: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            base_url: endpoints::GOOGLE_AI_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build from environment variables
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = get_config_opt("GEMINI_API_KEY")
            .or_else(|| get_config_opt("GOOGLE_API_KEY"))
            .ok_or_else(|| {
                ProviderError::Config("GEMINI_API_KEY or GOOGLE_API_KEY must be set".to_string())
            })?;

        let max_output_tokens = u32::try_from(get_config_int(
            "QB_MAX_OUTPUT_TOKENS",
            DEFAULT_MAX_OUTPUT_TOKENS as i64,
        ))
        .map_err(|_| ProviderError::Config("QB_MAX_OUTPUT_TOKENS out of range".to_string()))?;

        Ok(Self::new(api_key)
            .with_model(get_config("QB_MODEL", DEFAULT_MODEL))
            .with_max_output_tokens(max_output_tokens)
            .with_base_url(get_config("GEMINI_BASE_URL", endpoints::GOOGLE_AI_BASE_URL)))
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Gemini API request with optional tools
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiTool {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    /// Gemini rejects an empty `parameters` object
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(rename = "functionResponse", skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}

// =============================================================================
// CONVERSION
// =============================================================================

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Model => "model",
        Role::User | Role::ToolResult => "user",
    }
}

fn to_gemini_part(part: &Part) -> Option<GeminiPart> {
    match part {
        Part::Text { content } if content.is_empty() => None,
        Part::Text { content } => Some(GeminiPart {
            text: Some(content.clone()),
            ..Default::default()
        }),
        Part::ToolCall { name, arguments } => Some(GeminiPart {
            function_call: Some(GeminiFunctionCall {
                name: name.clone(),
                args: Some(Value::Object(arguments.clone())),
            }),
            ..Default::default()
        }),
        Part::ToolResult { name, result } => {
            let response = match result.payload() {
                object @ Value::Object(_) => object,
                other => json!({ "result": other }),
            };
            Some(GeminiPart {
                function_response: Some(GeminiFunctionResponse {
                    name: name.clone(),
                    response,
                }),
                ..Default::default()
            })
        }
    }
}

/// Transcript turns as Gemini `contents`. Turns left without parts are dropped.
fn to_gemini_contents(turns: &[Turn]) -> Vec<GeminiContent> {
    turns
        .iter()
        .filter_map(|turn| {
            let parts: Vec<GeminiPart> = turn.parts.iter().filter_map(to_gemini_part).collect();
            (!parts.is_empty()).then(|| GeminiContent {
                role: gemini_role(turn.role),
                parts,
            })
        })
        .collect()
}

fn to_gemini_tools(tools: &[ToolDeclaration]) -> Option<Vec<GeminiTool>> {
    if tools.is_empty() {
        return None;
    }

    let function_declarations = tools
        .iter()
        .map(|t| GeminiFunctionDeclaration {
            name: t.name.clone(),
            description: t.description.clone(),
            parameters: match &t.parameters {
                Value::Object(map) if map.is_empty() => None,
                Value::Null => None,
                schema => Some(schema.clone()),
            },
        })
        .collect();

    Some(vec![GeminiTool {
        function_declarations,
    }])
}

fn call_arguments(call: &GeminiFunctionCall) -> Result<Map<String, Value>, ProviderError> {
    match &call.args {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(ProviderError::decode(format!(
            "functionCall {} has non-object args: {}",
            call.name, other
        ))),
    }
}

/// First candidate only. A candidate without content is an empty reply.
fn from_gemini_response(response: GeminiResponse) -> Result<ModelReply, ProviderError> {
    let usage = response.usage_metadata.map(|u| TokenUsage {
        prompt_tokens: u.prompt_token_count.unwrap_or(0),
        completion_tokens: u.candidates_token_count.unwrap_or(0),
        total_tokens: u.total_token_count.unwrap_or(0),
    });

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(ModelReply {
            usage,
            ..Default::default()
        });
    };

    let mut parts = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        match (part.text, part.function_call) {
            (_, Some(call)) => {
                let arguments = call_arguments(&call)?;
                parts.push(Part::tool_call(call.name, arguments));
            }
            (Some(text), None) => parts.push(Part::text(text)),
            (None, None) => {
                return Err(ProviderError::decode(
                    "response part has neither text nor functionCall",
                ))
            }
        }
    }

    Ok(ModelReply {
        parts,
        finish_reason: candidate.finish_reason,
        usage,
    })
}

fn preview(body: &str) -> String {
    if body.chars().count() > ERROR_PREVIEW_CHARS {
        let truncated: String = body.chars().take(ERROR_PREVIEW_CHARS).collect();
        format!("{}...[truncated]", truncated)
    } else {
        body.to_string()
    }
}

// =============================================================================
// CLIENT IMPLEMENTATION
// =============================================================================

/// Google Gemini Client
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self, ProviderError> {
        let config = GeminiConfig::from_env()?;
        info!(
            "Gemini API key mode: model={}, endpoint={}",
            config.model, config.base_url
        );
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn build_request(&self, request: ModelRequest<'_>) -> GeminiRequest {
        GeminiRequest {
            contents: to_gemini_contents(request.turns),
            tools: to_gemini_tools(request.tools),
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiClient {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Gemini
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ProviderError> {
        let url = endpoints::generate_content_url(&self.config.base_url, &self.config.model);
        let gemini_request = self.build_request(request);

        info!(
            "Gemini generate: model={}, turns={}, tools={}",
            self.config.model,
            gemini_request.contents.len(),
            request.tools.len()
        );
        debug!("Gemini request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini HTTP request failed: {}", e);
                ProviderError::Http(e.to_string())
            })?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(format!("Failed to read Gemini response body: {}", e)))?;

        if !status.is_success() {
            let body = preview(&raw_body);
            error!("Gemini API error {}: {}", status, body);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GeminiResponse = serde_json::from_str(&raw_body).map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            error!("Raw response: {}", preview(&raw_body));
            ProviderError::decode(e.to_string())
        })?;

        let reply = from_gemini_response(parsed)?;

        if reply.has_tool_calls() {
            info!(
                "Gemini returned {} tool calls",
                reply.parts.iter().filter(|p| p.is_tool_call()).count()
            );
            for part in &reply.parts {
                if let Part::ToolCall { name, arguments } = part {
                    let args = Value::Object(arguments.clone());
                    debug!("  Tool call: {}({})", name, args);
                }
            }
        }

        Ok(reply)
    }
}
