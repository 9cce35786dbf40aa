//! Agent runner: a single optional tool round trip with the model.

use super::tools::{parse_tool_call, CourseSearchTool, ToolOutput};
use crate::course::SourceReference;
use crate::error::Result;
use crate::llm::{CompletionModel, CompletionRequest, ContentSegment, Message};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Protocol states of one agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    AwaitingModel,
    ToolRequested,
    AwaitingModelFinal,
    Done,
}

/// Agent that can search course content before answering.
pub struct Agent {
    model: Arc<dyn CompletionModel>,
    search: CourseSearchTool,
    temperature: f32,
    max_tokens: u32,
}

impl Agent {
    pub fn new(model: Arc<dyn CompletionModel>, search: CourseSearchTool) -> Self {
        Self {
            model,
            search,
            temperature: 0.0,
            max_tokens: 800,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Answer `prompt` under `system`, letting the model search once if it asks to.
    #[instrument(skip_all, fields(model = self.model.model_name()))]
    pub async fn run(&self, system: &str, prompt: &str) -> Result<AgentOutcome> {
        let mut path = vec![AgentState::AwaitingModel];
        let mut messages = vec![Message::user(prompt)];

        let first = self
            .model
            .complete(&CompletionRequest {
                system: system.to_string(),
                messages: messages.clone(),
                tools: vec![CourseSearchTool::definition()],
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .await?;

        if !first.requests_tools() {
            path.push(AgentState::Done);
            return Ok(AgentOutcome {
                answer: first.first_text(),
                sources: Vec::new(),
                tool_calls: Vec::new(),
                path,
            });
        }

        path.push(AgentState::ToolRequested);

        let mut results = Vec::new();
        let mut tool_calls = Vec::new();
        let mut sources = Vec::new();

        for segment in &first.content {
            let ContentSegment::ToolInvocation { id, name, input } = segment else {
                continue;
            };
            let (record, output) = self.execute_invocation(name, input).await?;
            results.push(ContentSegment::ToolResult {
                invocation_id: id.clone(),
                content: record.result.clone(),
                is_error: record.is_error,
            });
            sources = output.map(|o| o.sources).unwrap_or_default();
            tool_calls.push(record);
        }

        messages.push(Message::assistant(first.content.clone()));
        messages.push(Message::tool_results(results));

        path.push(AgentState::AwaitingModelFinal);
        let last = self
            .model
            .complete(&CompletionRequest {
                system: system.to_string(),
                messages,
                tools: Vec::new(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .await?;

        if last.requests_tools() {
            warn!("Model asked for another tool call after results; answering with its text");
        }

        path.push(AgentState::Done);
        debug!("Agent finished after {} tool calls", tool_calls.len());

        Ok(AgentOutcome {
            answer: last.first_text(),
            sources,
            tool_calls,
            path,
        })
    }

    /// Run one invocation. Only upstream failures escape; everything else
    /// becomes an error result the model can read.
    async fn execute_invocation(
        &self,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<(ToolCallRecord, Option<ToolOutput>)> {
        info!("Agent calling tool: {} with args: {}", name, input);

        let outcome = match parse_tool_call(name, input) {
            Ok(call) => self.search.execute(&call).await,
            Err(e) => Err(e),
        };

        let mut record = ToolCallRecord {
            name: name.to_string(),
            arguments: input.to_string(),
            result: String::new(),
            is_error: false,
        };

        match outcome {
            Ok(output) => {
                record.result = output.text.clone();
                Ok((record, Some(output)))
            }
            Err(e) if e.is_upstream() => Err(e),
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                record.result = e.to_string();
                if !record.result.starts_with("Tool error") {
                    record.result = format!("Tool error: {}", e);
                }
                record.is_error = true;
                Ok((record, None))
            }
        }
    }
}

/// Result of an agent run.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Final answer text.
    pub answer: String,
    /// Sources of the last executed search.
    pub sources: Vec<SourceReference>,
    /// Record of all tool calls made.
    pub tool_calls: Vec<ToolCallRecord>,
    /// States visited, in order.
    pub path: Vec<AgentState>,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Text returned to the model.
    pub result: String,
    pub is_error: bool,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::SEARCH_TOOL_NAME;
    use crate::course::{Chunk, CourseRecord, LessonRecord};
    use crate::embedding::{Embedder, TrigramEmbedder};
    use crate::error::PensumError;
    use crate::index::CourseIndex;
    use crate::llm::{StopReason, NO_TEXT_FALLBACK};
    use crate::testing::ScriptedModel;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;
    use serde_json::json;

    async fn search_tool() -> CourseSearchTool {
        let index = CourseIndex::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(TrigramEmbedder::new(256)),
        );
        let mut course = CourseRecord::new("Intro to MCP");
        course.lessons.push(LessonRecord {
            lesson_number: 1,
            title: "Servers".to_string(),
            link: Some("https://example.com/mcp/1".to_string()),
        });
        let chunk = Chunk {
            course_title: course.title.clone(),
            lesson_number: Some(1),
            chunk_index: 0,
            text: "MCP servers expose tools.".to_string(),
        };
        index.upsert_course(&course, &[chunk]).await.unwrap();
        CourseSearchTool::new(Arc::new(index))
    }

    fn invocation(id: &str, input: serde_json::Value) -> ContentSegment {
        ContentSegment::ToolInvocation {
            id: id.to_string(),
            name: SEARCH_TOOL_NAME.to_string(),
            input,
        }
    }

    #[tokio::test]
    async fn test_direct_answer_skips_tools() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::text("4")]));
        let agent = Agent::new(model.clone(), search_tool().await);

        let outcome = agent.run("system", "What is 2+2?").await.unwrap();
        assert_eq!(outcome.answer, "4");
        assert!(outcome.sources.is_empty());
        assert!(outcome.tool_calls.is_empty());
        assert_eq!(outcome.path, vec![AgentState::AwaitingModel, AgentState::Done]);

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].max_tokens, 800);
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::tool_use(vec![invocation("t1", json!({"query": "MCP servers"}))]),
            ScriptedModel::text("MCP servers expose tools."),
        ]));
        let agent = Agent::new(model.clone(), search_tool().await);

        let outcome = agent.run("system", "What do MCP servers do?").await.unwrap();
        assert_eq!(outcome.answer, "MCP servers expose tools.");
        assert_eq!(
            outcome.path,
            vec![
                AgentState::AwaitingModel,
                AgentState::ToolRequested,
                AgentState::AwaitingModelFinal,
                AgentState::Done
            ]
        );
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.sources[0].label, "Intro to MCP - Lesson 1");
        assert!(outcome.tool_calls[0].result.contains("[Intro to MCP - Lesson 1]"));

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].tools.is_empty());
        assert_eq!(requests[1].messages.len(), 3);
        match &requests[1].messages[2].content[0] {
            ContentSegment::ToolResult { invocation_id, is_error, .. } => {
                assert_eq!(invocation_id, "t1");
                assert!(!is_error);
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_every_invocation_in_a_response_is_executed() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::tool_use(vec![
                invocation("a", json!({"query": "servers"})),
                invocation("b", json!({"query": "tools", "lesson_number": 1})),
            ]),
            ScriptedModel::text("done"),
        ]));
        let agent = Agent::new(model.clone(), search_tool().await);

        let outcome = agent.run("system", "q").await.unwrap();
        assert_eq!(outcome.tool_calls.len(), 2);
        assert_eq!(model.requests()[1].messages[2].content.len(), 2);
    }

    #[tokio::test]
    async fn test_bad_arguments_become_error_result() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::tool_use(vec![invocation("t1", json!({"lesson_number": "x"}))]),
            ScriptedModel::text("Sorry, the search failed."),
        ]));
        let agent = Agent::new(model.clone(), search_tool().await);

        let outcome = agent.run("system", "q").await.unwrap();
        assert_eq!(outcome.answer, "Sorry, the search failed.");
        assert!(outcome.sources.is_empty());
        assert!(outcome.tool_calls[0].is_error);
        assert!(outcome.tool_calls[0].result.starts_with("Tool error:"));

        match &model.requests()[1].messages[2].content[0] {
            ContentSegment::ToolResult { is_error, content, .. } => {
                assert!(is_error);
                assert!(content.starts_with("Tool error:"));
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tool_only_final_response_uses_fallback() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::tool_use(vec![invocation("t1", json!({"query": "MCP"}))]),
            ScriptedModel::response(vec![invocation("t2", json!({"query": "again"}))], StopReason::ToolUse),
        ]));
        let agent = Agent::new(model, search_tool().await);

        let outcome = agent.run("system", "q").await.unwrap();
        assert_eq!(outcome.answer, NO_TEXT_FALLBACK);
        assert_eq!(outcome.tool_calls.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_use_without_invocations_is_a_plain_answer() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::response(
            vec![ContentSegment::text("Just text")],
            StopReason::ToolUse,
        )]));
        let agent = Agent::new(model, search_tool().await);
        let outcome = agent.run("system", "q").await.unwrap();
        assert_eq!(outcome.answer, "Just text");
        assert_eq!(outcome.path, vec![AgentState::AwaitingModel, AgentState::Done]);
    }

    #[tokio::test]
    async fn test_upstream_failures_propagate() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let agent = Agent::new(model, search_tool().await);
        let err = agent.run("system", "q").await.unwrap_err();
        assert!(err.is_upstream());
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(PensumError::UpstreamGeneration("embedding service returned 503".to_string()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(PensumError::UpstreamGeneration("embedding service returned 503".to_string()))
        }

        fn dimensions(&self) -> usize {
            8
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_during_search_propagates() {
        let index = CourseIndex::new(Arc::new(MemoryVectorStore::new()), Arc::new(FailingEmbedder));
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::tool_use(vec![invocation("t1", json!({"query": "MCP"}))]),
            ScriptedModel::text("unreachable"),
        ]));
        let agent = Agent::new(model.clone(), CourseSearchTool::new(Arc::new(index)));

        let err = agent.run("system", "q").await.unwrap_err();
        assert!(matches!(err, PensumError::UpstreamGeneration(_)));
        assert_eq!(model.requests().len(), 1);
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "search_course_content".to_string(),
            arguments: r#"{"query":"test"}"#.to_string(),
            result: "Found results".to_string(),
            is_error: false,
        };
        assert_eq!(format!("{}", record), r#"search_course_content({"query":"test"})"#);
    }
}
