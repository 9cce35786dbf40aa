//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::course::source_label;
use crate::index::SearchOutcome;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    course: Option<&str>,
    lesson: Option<u32>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching...");
    let results = orchestrator.index().search(query, course, lesson).await;
    spinner.finish_and_clear();

    match results {
        Ok(SearchOutcome::CourseNotFound(name)) => {
            Output::warning(&format!("No course found matching '{}'", name));
        }
        Ok(SearchOutcome::Found(hits)) if hits.is_empty() => {
            Output::warning("No results found matching your query.");
        }
        Ok(SearchOutcome::Found(hits)) => {
            Output::success(&format!("Found {} results", hits.len()));
            for hit in &hits {
                Output::search_result(
                    &source_label(&hit.chunk.course_title, hit.chunk.lesson_number),
                    hit.score,
                    &hit.chunk.text,
                    hit.link().as_deref(),
                );
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
