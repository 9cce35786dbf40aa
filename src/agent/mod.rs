//! Tool-using agent over the course index.
//!
//! The model may call the course search tool once per query; results are
//! folded back into a final answer along with the sources they came from.

mod runner;
mod tools;

pub use runner::{Agent, AgentOutcome, AgentState, ToolCallRecord};
pub use tools::{
    parse_tool_call, CourseSearchTool, SearchArgs, ToolCall, ToolOutput, SEARCH_TOOL_NAME,
};
