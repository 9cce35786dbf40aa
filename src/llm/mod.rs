//! Language-model completion interface.
//!
//! Responses are ordered content segments plus a stop reason. Providers map
//! their wire formats onto these types so the agent loop stays provider-neutral.

mod anthropic;
mod openai;

pub use anthropic::AnthropicModel;
pub use openai::OpenAIModel;

use crate::config::{GenerationProvider, Settings};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Returned by [`CompletionResponse::first_text`] when no segment carries text.
pub const NO_TEXT_FALLBACK: &str = "Response contained no text content";

/// Speaker of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One segment of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentSegment {
    Text {
        text: String,
    },
    ToolInvocation {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        invocation_id: String,
        content: String,
        is_error: bool,
    },
}

impl ContentSegment {
    pub fn text(text: impl Into<String>) -> Self {
        ContentSegment::Text { text: text.into() }
    }
}

/// A conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentSegment>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentSegment::text(text)],
        }
    }

    pub fn assistant(content: Vec<ContentSegment>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_results(results: Vec<ContentSegment>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    /// Map a provider's stop string.
    pub fn parse(value: &str) -> Self {
        match value {
            "end_turn" | "stop" => StopReason::EndTurn,
            "tool_use" | "tool_calls" => StopReason::ToolUse,
            "max_tokens" | "length" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// Declarative description of a tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool's arguments.
    pub input_schema: serde_json::Value,
}

/// A completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    /// Tools offered with automatic tool choice. Empty means no tools.
    pub tools: Vec<ToolDefinition>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: Vec<ContentSegment>,
    pub stop_reason: StopReason,
}

impl CompletionResponse {
    /// First non-empty text segment, or [`NO_TEXT_FALLBACK`].
    pub fn first_text(&self) -> String {
        for segment in &self.content {
            match segment {
                ContentSegment::Text { text } if !text.trim().is_empty() => return text.clone(),
                ContentSegment::Text { .. }
                | ContentSegment::ToolInvocation { .. }
                | ContentSegment::ToolResult { .. } => {}
            }
        }
        NO_TEXT_FALLBACK.to_string()
    }

    /// Tool invocation segments, in order.
    pub fn tool_invocations(&self) -> Vec<&ContentSegment> {
        self.content
            .iter()
            .filter(|s| matches!(s, ContentSegment::ToolInvocation { .. }))
            .collect()
    }

    /// Whether the model stopped to use a tool and named at least one.
    pub fn requests_tools(&self) -> bool {
        self.stop_reason == StopReason::ToolUse && !self.tool_invocations().is_empty()
    }
}

/// A language-model completion endpoint.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Run one completion. Transport failures are `UpstreamGeneration` errors.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

/// Build the completion model selected in settings.
pub fn create_model(settings: &Settings) -> Result<Arc<dyn CompletionModel>> {
    let generation = &settings.generation;
    let timeout = Duration::from_secs(generation.timeout_seconds);
    Ok(match generation.provider {
        GenerationProvider::Anthropic => Arc::new(AnthropicModel::from_env(&generation.model, timeout)?),
        GenerationProvider::OpenAI => Arc::new(OpenAIModel::new(&generation.model, timeout)?),
    })
}
