//! The course search tool exposed to the model.

use crate::course::{source_label, SourceReference};
use crate::error::{PensumError, Result};
use crate::index::{CourseIndex, SearchHit, SearchOutcome};
use crate::llm::ToolDefinition;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Name the model uses to invoke the search tool.
pub const SEARCH_TOOL_NAME: &str = "search_course_content";

/// Tools the model can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolCall {
    SearchCourseContent(SearchArgs),
}

/// Arguments of the search tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default, alias = "courseName")]
    pub course_name: Option<String>,
    #[serde(default, alias = "lessonNumber")]
    pub lesson_number: Option<u32>,
}

/// What a tool call hands back: text for the model, sources for the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub sources: Vec<SourceReference>,
}

/// Parse a tool invocation into a typed call.
pub fn parse_tool_call(name: &str, input: &serde_json::Value) -> Result<ToolCall> {
    match name {
        SEARCH_TOOL_NAME => {
            let mut args: SearchArgs = serde_json::from_value(input.clone())
                .map_err(|e| PensumError::Tool(format!("Invalid arguments for {}: {}", name, e)))?;
            if args.query.trim().is_empty() {
                return Err(PensumError::Tool("'query' must not be empty".to_string()));
            }
            args.course_name = args.course_name.filter(|c| !c.trim().is_empty());
            Ok(ToolCall::SearchCourseContent(args))
        }
        _ => Err(PensumError::Tool(format!("Unknown tool: {}", name))),
    }
}

/// Searches course content through the index.
#[derive(Clone)]
pub struct CourseSearchTool {
    index: Arc<CourseIndex>,
}

impl CourseSearchTool {
    pub fn new(index: Arc<CourseIndex>) -> Self {
        Self { index }
    }

    /// Schema advertised to the model.
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Search course materials with smart course name matching and lesson filtering"
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Execute a parsed call.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolOutput> {
        match call {
            ToolCall::SearchCourseContent(args) => {
                self.search(&args.query, args.course_name.as_deref(), args.lesson_number)
                    .await
            }
        }
    }

    /// Run a search and format it for the model.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<ToolOutput> {
        info!(
            "Searching course content: query={:?} course={:?} lesson={:?}",
            query, course_name, lesson_number
        );

        match self.index.search(query, course_name, lesson_number).await? {
            SearchOutcome::CourseNotFound(name) => Ok(ToolOutput {
                text: format!("No course found matching '{}'", name),
                sources: Vec::new(),
            }),
            SearchOutcome::Found(hits) if hits.is_empty() => Ok(ToolOutput {
                text: empty_message(course_name, lesson_number),
                sources: Vec::new(),
            }),
            SearchOutcome::Found(hits) => Ok(format_hits(&hits)),
        }
    }
}

fn empty_message(course_name: Option<&str>, lesson_number: Option<u32>) -> String {
    let filter = match (course_name, lesson_number) {
        (Some(course), Some(n)) => format!(" for lesson {} in course '{}'", n, course),
        (Some(course), None) => format!(" in course '{}'", course),
        (None, Some(n)) => format!(" in lesson {}", n),
        (None, None) => String::new(),
    };
    format!("No relevant content found{}.", filter)
}

fn format_hits(hits: &[SearchHit]) -> ToolOutput {
    let mut blocks = Vec::with_capacity(hits.len());
    let mut sources: Vec<SourceReference> = Vec::new();

    for hit in hits {
        let label = source_label(&hit.chunk.course_title, hit.chunk.lesson_number);
        blocks.push(format!("[{}]\n{}", label, hit.chunk.text));
        if !sources.iter().any(|s| s.label == label) {
            sources.push(SourceReference {
                label,
                link: hit.link(),
            });
        }
    }

    ToolOutput {
        text: blocks.join("\n\n"),
        sources,
    }
}
