//! Anthropic Messages API client.

use super::{
    CompletionModel, CompletionRequest, CompletionResponse, ContentSegment, Message, Role,
    StopReason,
};
use crate::error::{PensumError, Result};
use crate::openai::http_client;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Completion model backed by the Anthropic Messages API.
pub struct AnthropicModel {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicModel {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key,
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: http_client(timeout)?,
        })
    }

    /// Read the key from `ANTHROPIC_API_KEY`.
    pub fn from_env(model: &str, timeout: Duration) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| PensumError::Config("ANTHROPIC_API_KEY is not set".to_string()))?;
        Self::new(api_key, model, timeout)
    }

    /// Point at a different host (proxies, gateways).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.trim())
                .map_err(|_| PensumError::Config("invalid Anthropic API key".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_body<'a>(&'a self, request: &'a CompletionRequest) -> WireRequest<'a> {
        let tools: Vec<WireTool<'a>> = request
            .tools
            .iter()
            .map(|t| WireTool {
                name: &t.name,
                description: &t.description,
                input_schema: &t.input_schema,
            })
            .collect();
        let tool_choice = (!tools.is_empty()).then_some(WireToolChoice { kind: "auto" });

        WireRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: request.messages.iter().map(to_wire_message).collect(),
            tools,
            tool_choice,
        }
    }
}

fn to_wire_message(message: &Message) -> WireMessage<'_> {
    WireMessage {
        role: match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: message
            .content
            .iter()
            .map(|segment| match segment {
                ContentSegment::Text { text } => WireBlock::Text { text },
                ContentSegment::ToolInvocation { id, name, input } => {
                    WireBlock::ToolUse { id, name, input }
                }
                ContentSegment::ToolResult {
                    invocation_id,
                    content,
                    is_error,
                } => WireBlock::ToolResult {
                    tool_use_id: invocation_id,
                    content,
                    is_error: *is_error,
                },
            })
            .collect(),
    }
}

#[async_trait]
impl CompletionModel for AnthropicModel {
    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = self.build_body(request);
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                PensumError::UpstreamGeneration(format!("failed to call Anthropic messages API: {}", e))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(PensumError::UpstreamGeneration(format!(
                "Anthropic returned {}: {}",
                status, text
            )));
        }

        let parsed: WireResponse = resp.json().await.map_err(|e| {
            PensumError::UpstreamGeneration(format!("failed to parse Anthropic response: {}", e))
        })?;

        debug!(
            "Anthropic response: {} blocks, stop_reason={:?}",
            parsed.content.len(),
            parsed.stop_reason
        );
        Ok(parsed.into_response())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<WireToolChoice>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: Vec<WireBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock<'a> {
    Text {
        text: &'a str,
    },
    ToolUse {
        id: &'a str,
        name: &'a str,
        input: &'a serde_json::Value,
    },
    ToolResult {
        tool_use_id: &'a str,
        content: &'a str,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Serialize)]
struct WireTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a serde_json::Value,
}

#[derive(Serialize)]
struct WireToolChoice {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<WireResponseBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

impl WireResponse {
    fn into_response(self) -> CompletionResponse {
        let content = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                WireResponseBlock::Text { text } => Some(ContentSegment::Text { text }),
                WireResponseBlock::ToolUse { id, name, input } => {
                    Some(ContentSegment::ToolInvocation { id, name, input })
                }
                WireResponseBlock::Other => None,
            })
            .collect();

        CompletionResponse {
            content,
            stop_reason: self
                .stop_reason
                .as_deref()
                .map(StopReason::parse)
                .unwrap_or(StopReason::EndTurn),
        }
    }
}
