//! OpenAI chat completions backend.

use super::{
    CompletionModel, CompletionRequest, CompletionResponse, ContentSegment, Message, Role,
    StopReason, ToolDefinition,
};
use crate::error::{PensumError, Result};
use crate::openai::create_client_with_timeout;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
    ChatCompletionToolChoiceOption, ChatCompletionToolType, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, FinishReason, FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Completion model backed by OpenAI chat completions.
pub struct OpenAIModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAIModel {
    pub fn new(model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(timeout)?,
            model: model.to_string(),
        })
    }

    fn build_request(&self, request: &CompletionRequest) -> Result<CreateChatCompletionRequest> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();
        if !request.system.is_empty() {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(request.system.clone())
                    .build()
                    .map_err(build_error)?
                    .into(),
            );
        }
        for message in &request.messages {
            messages.extend(to_chat_messages(message)?);
        }

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .temperature(request.temperature)
            .max_completion_tokens(request.max_tokens);

        if !request.tools.is_empty() {
            args.tools(request.tools.iter().map(to_chat_tool).collect::<Vec<_>>())
                .tool_choice(ChatCompletionToolChoiceOption::Auto);
        }

        args.build().map_err(build_error)
    }
}

fn build_error(e: async_openai::error::OpenAIError) -> PensumError {
    PensumError::InvalidInput(format!("Failed to build chat request: {}", e))
}

fn to_chat_tool(tool: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: tool.name.clone(),
            description: Some(tool.description.clone()),
            parameters: Some(tool.input_schema.clone()),
            strict: None,
        },
    }
}

/// Chat messages are flat: tool results become separate `tool` messages.
fn to_chat_messages(message: &Message) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut out: Vec<ChatCompletionRequestMessage> = Vec::new();
    let mut texts = Vec::new();
    let mut calls = Vec::new();

    for segment in &message.content {
        match segment {
            ContentSegment::Text { text } => texts.push(text.as_str()),
            ContentSegment::ToolInvocation { id, name, input } => {
                calls.push(ChatCompletionMessageToolCall {
                    id: id.clone(),
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionCall {
                        name: name.clone(),
                        arguments: input.to_string(),
                    },
                });
            }
            ContentSegment::ToolResult {
                invocation_id,
                content,
                ..
            } => {
                out.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(invocation_id.clone())
                        .content(content.clone())
                        .build()
                        .map_err(build_error)?
                        .into(),
                );
            }
        }
    }

    let text = texts.join("\n");
    match message.role {
        Role::User if !text.is_empty() => out.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(text)
                .build()
                .map_err(build_error)?
                .into(),
        ),
        Role::Assistant if !text.is_empty() || !calls.is_empty() => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if !text.is_empty() {
                args.content(text);
            }
            if !calls.is_empty() {
                args.tool_calls(calls);
            }
            out.push(args.build().map_err(build_error)?.into());
        }
        _ => {}
    }

    Ok(out)
}

#[async_trait]
impl CompletionModel for OpenAIModel {
    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let chat_request = self.build_request(request)?;
        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            PensumError::UpstreamGeneration(format!("OpenAI chat API error: {}", e))
        })?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            PensumError::UpstreamGeneration("OpenAI returned no choices".to_string())
        })?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content {
            content.push(ContentSegment::Text { text });
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            let input = serde_json::from_str(&call.function.arguments)
                .unwrap_or(serde_json::Value::String(call.function.arguments));
            content.push(ContentSegment::ToolInvocation {
                id: call.id,
                name: call.function.name,
                input,
            });
        }

        let stop_reason = match choice.finish_reason {
            Some(FinishReason::ToolCalls) | Some(FinishReason::FunctionCall) => StopReason::ToolUse,
            Some(FinishReason::Length) => StopReason::MaxTokens,
            Some(FinishReason::ContentFilter) => StopReason::Other("content_filter".to_string()),
            Some(FinishReason::Stop) | None => StopReason::EndTurn,
        };

        debug!("OpenAI response: {} segments, {:?}", content.len(), stop_reason);
        Ok(CompletionResponse {
            content,
            stop_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_results_become_tool_messages() {
        let message = Message::tool_results(vec![
            ContentSegment::ToolResult {
                invocation_id: "call_1".to_string(),
                content: "first".to_string(),
                is_error: false,
            },
            ContentSegment::ToolResult {
                invocation_id: "call_2".to_string(),
                content: "Tool error: bad".to_string(),
                is_error: true,
            },
        ]);
        let out = to_chat_messages(&message).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|m| matches!(m, ChatCompletionRequestMessage::Tool(_))));
    }

    #[test]
    fn test_assistant_invocations_become_tool_calls() {
        let message = Message::assistant(vec![ContentSegment::ToolInvocation {
            id: "call_1".to_string(),
            name: "search_course_content".to_string(),
            input: json!({"query": "MCP"}),
        }]);
        let out = to_chat_messages(&message).unwrap();
        match &out[..] {
            [ChatCompletionRequestMessage::Assistant(msg)] => {
                let calls = msg.tool_calls.as_ref().unwrap();
                assert_eq!(calls[0].function.name, "search_course_content");
                assert_eq!(calls[0].function.arguments, r#"{"query":"MCP"}"#);
            }
            other => panic!("unexpected messages: {:?}", other),
        }
    }

    #[test]
    fn test_build_request_with_and_without_tools() {
        let model = OpenAIModel::new("gpt-4o-mini", Duration::from_secs(5)).unwrap();
        let mut request = CompletionRequest {
            system: "Be brief.".to_string(),
            messages: vec![Message::user("What is MCP?")],
            tools: vec![ToolDefinition {
                name: "search_course_content".to_string(),
                description: "Search".to_string(),
                input_schema: json!({"type": "object"}),
            }],
            temperature: 0.0,
            max_tokens: 800,
        };

        let built = model.build_request(&request).unwrap();
        assert_eq!(built.messages.len(), 2);
        assert_eq!(built.tools.as_ref().map(Vec::len), Some(1));
        assert!(built.tool_choice.is_some());

        request.tools.clear();
        let built = model.build_request(&request).unwrap();
        assert!(built.tools.is_none());
        assert!(built.tool_choice.is_none());
    }
}
