//! Test doubles shared across module tests.

use crate::error::{PensumError, Result};
use crate::llm::{CompletionModel, CompletionRequest, CompletionResponse, ContentSegment, StopReason};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Completion model that replays scripted responses and records requests.
/// Running past the script is an upstream failure.
pub struct ScriptedModel {
    script: Mutex<VecDeque<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<CompletionResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn response(content: Vec<ContentSegment>, stop_reason: StopReason) -> CompletionResponse {
        CompletionResponse { content, stop_reason }
    }

    pub fn text(text: &str) -> CompletionResponse {
        Self::response(vec![ContentSegment::text(text)], StopReason::EndTurn)
    }

    pub fn tool_use(invocations: Vec<ContentSegment>) -> CompletionResponse {
        Self::response(invocations, StopReason::ToolUse)
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Queue more responses.
    pub fn push(&self, response: CompletionResponse) {
        self.script.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PensumError::UpstreamGeneration("scripted model exhausted".to_string()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
