//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::path::Path;

/// Run the ingest command on a file or folder.
pub async fn run_ingest(path: &Path, clear: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }
    if preflight::is_ephemeral(&settings) {
        Output::warning("Vector store is in-memory; ingested courses are lost on exit.");
    }

    let orchestrator = Orchestrator::new(settings)?;

    if path.is_file() {
        if clear {
            orchestrator.index().clear().await?;
        }
        let spinner = Output::spinner(&format!("Ingesting {}...", path.display()));
        let result = orchestrator.ingest_file(path).await;
        spinner.finish_and_clear();

        let ingested = result?;
        if ingested.added {
            Output::success(&format!(
                "Added '{}' ({} lessons, {} chunks)",
                ingested.course.title,
                ingested.course.lessons.len(),
                ingested.chunk_count
            ));
        } else {
            Output::info(&format!("'{}' is already indexed.", ingested.course.title));
        }
        return Ok(());
    }

    let spinner = Output::spinner(&format!("Ingesting documents from {}...", path.display()));
    let result = orchestrator.ingest_folder(path, clear).await;
    spinner.finish_and_clear();
    let report = result?;

    for course in &report.added {
        Output::list_item(&format!(
            "{} ({} chunks)",
            course.course.title, course.chunk_count
        ));
    }
    for title in &report.skipped {
        Output::info(&format!("Skipped '{}' (already indexed)", title));
    }
    for failed in &report.failed {
        Output::warning(&format!("Failed {}: {}", failed.path.display(), failed.error));
    }

    Output::success(&format!(
        "Added {} courses with {} chunks",
        report.added.len(),
        report.chunk_count()
    ));

    Ok(())
}
