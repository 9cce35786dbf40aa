//! Pipeline orchestrator for Pensum.
//!
//! Coordinates ingestion (parse, chunk, embed, index) and question answering
//! (history, agent, search) behind one facade.

use crate::agent::{Agent, AgentOutcome, CourseSearchTool, ToolOutput};
use crate::chunking::DocumentChunker;
use crate::config::{Prompts, Settings};
use crate::course::{CourseRecord, SourceReference};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{PensumError, Result};
use crate::history::SessionStore;
use crate::index::CourseIndex;
use crate::llm::{create_model, CompletionModel};
use crate::vector_store::{create_store, VectorStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// File extensions picked up by folder ingestion.
const DOCUMENT_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// The main orchestrator for the Pensum pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    chunker: DocumentChunker,
    index: Arc<CourseIndex>,
    agent: Agent,
    sessions: SessionStore,
}

impl Orchestrator {
    /// Create an orchestrator with components built from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder = create_embedder(&settings)?;
        let store = create_store(&settings)?;
        let model = create_model(&settings)?;
        info!(
            "Using {} embeddings, {} store, {} generation ({})",
            settings.embedding.provider,
            settings.vector_store.provider,
            settings.generation.provider,
            model.model_name()
        );

        Self::with_components(settings, prompts, store, embedder, model)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn CompletionModel>,
    ) -> Result<Self> {
        let chunker = DocumentChunker::new(settings.chunking.to_config())?;
        let index = Arc::new(
            CourseIndex::new(store, embedder).with_max_results(settings.search.max_results),
        );
        let agent = Agent::new(model, CourseSearchTool::new(index.clone()))
            .with_temperature(settings.generation.temperature)
            .with_max_tokens(settings.generation.max_tokens);
        let sessions = SessionStore::new(settings.history.max_history)
            .with_max_sessions(settings.history.max_sessions);

        Ok(Self {
            settings,
            prompts,
            chunker,
            index,
            agent,
            sessions,
        })
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the course index.
    pub fn index(&self) -> Arc<CourseIndex> {
        self.index.clone()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Parse, chunk and index one course document.
    #[instrument(skip(self, raw), fields(bytes = raw.len()))]
    pub async fn ingest_document(&self, raw: &str) -> Result<IngestedCourse> {
        let chunked = self.chunker.chunk_document(raw)?;
        let added = self.index.upsert_course(&chunked.course, &chunked.chunks).await?;

        if added {
            info!(
                "Added course '{}' ({} lessons, {} chunks)",
                chunked.course.title,
                chunked.course.lessons.len(),
                chunked.chunks.len()
            );
        } else {
            info!("Course '{}' already indexed, skipping", chunked.course.title);
        }

        Ok(IngestedCourse {
            chunk_count: if added { chunked.chunks.len() } else { 0 },
            course: chunked.course,
            added,
        })
    }

    /// Ingest a document from disk.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestedCourse> {
        let raw = std::fs::read_to_string(path)?;
        self.ingest_document(&raw).await
    }

    /// Ingest every `.txt` / `.md` file in `dir`. Malformed or unreadable
    /// files are reported and skipped; upstream failures abort.
    #[instrument(skip(self))]
    pub async fn ingest_folder(&self, dir: &Path, clear: bool) -> Result<IngestReport> {
        if !dir.is_dir() {
            return Err(PensumError::InvalidInput(format!(
                "Not a directory: {}",
                dir.display()
            )));
        }

        if clear {
            info!("Clearing existing course data");
            self.index.clear().await?;
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_document(path))
            .collect();
        files.sort();

        let mut known: BTreeSet<String> = self.index.existing_course_titles().await?;
        let mut report = IngestReport::default();

        for path in files {
            let chunked = match std::fs::read_to_string(&path)
                .map_err(PensumError::from)
                .and_then(|raw| self.chunker.chunk_document(&raw))
            {
                Ok(chunked) => chunked,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.failed.push(FailedDocument {
                        path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if known.contains(&chunked.course.title) {
                debug!("Course '{}' already indexed", chunked.course.title);
                report.skipped.push(chunked.course.title);
                continue;
            }

            let added = self.index.upsert_course(&chunked.course, &chunked.chunks).await?;
            known.insert(chunked.course.title.clone());
            if !added {
                report.skipped.push(chunked.course.title);
                continue;
            }

            info!(
                "Added course '{}' from {} ({} chunks)",
                chunked.course.title,
                path.display(),
                chunked.chunks.len()
            );
            report.added.push(IngestedCourse {
                chunk_count: chunked.chunks.len(),
                course: chunked.course,
                added: true,
            });
        }

        info!(
            "Folder ingestion: {} added, {} skipped, {} failed",
            report.added.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Answer a question. With a session id, prior exchanges of that session
    /// are included and this exchange is remembered.
    ///
    /// The query must contain non-whitespace text; a blank query is rejected
    /// with `InvalidInput` before any model or embedding call. Past that check
    /// only upstream and local index failures are returned.
    #[instrument(skip(self, query))]
    pub async fn answer_query(&self, query: &str, session_id: Option<&str>) -> Result<QueryAnswer> {
        if query.trim().is_empty() {
            return Err(PensumError::InvalidInput("query must not be empty".to_string()));
        }

        let prompt = self.prompts.query_prompt(query);

        let Some(id) = session_id else {
            let outcome = self.agent.run(&self.prompts.system_prompt(None), &prompt).await?;
            return Ok(QueryAnswer::from(outcome));
        };

        // Held for the whole query so a session's exchanges stay ordered.
        let handle = self.sessions.session(id);
        let mut history = handle.lock().await;

        let system = self.prompts.system_prompt(history.snapshot().as_deref());
        let outcome = self.agent.run(&system, &prompt).await?;
        history.push(query, &outcome.answer);

        Ok(QueryAnswer::from(outcome))
    }

    /// Run the search tool directly, without the model.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<ToolOutput> {
        CourseSearchTool::new(self.index.clone())
            .search(query, course_name, lesson_number)
            .await
    }

    /// Mint a new session id.
    pub fn create_session(&self) -> String {
        self.sessions.create_session()
    }

    /// Forget a session's history.
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.clear_session(session_id)
    }

    /// Course count and titles.
    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        let titles = self.index.existing_course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: titles.len(),
            course_titles: titles.into_iter().collect(),
        })
    }
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| DOCUMENT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Result of ingesting one document.
#[derive(Debug, Clone)]
pub struct IngestedCourse {
    pub course: CourseRecord,
    /// Chunks written; zero when the course was already indexed.
    pub chunk_count: usize,
    /// Whether the course was new.
    pub added: bool,
}

/// A document that could not be ingested.
#[derive(Debug, Clone)]
pub struct FailedDocument {
    pub path: PathBuf,
    pub error: String,
}

/// Result of ingesting a folder.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub added: Vec<IngestedCourse>,
    /// Titles already indexed.
    pub skipped: Vec<String>,
    pub failed: Vec<FailedDocument>,
}

impl IngestReport {
    pub fn chunk_count(&self) -> usize {
        self.added.iter().map(|c| c.chunk_count).sum()
    }
}

/// Answer to a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<SourceReference>,
}

impl From<AgentOutcome> for QueryAnswer {
    fn from(outcome: AgentOutcome) -> Self {
        Self {
            answer: outcome.answer,
            sources: outcome.sources,
        }
    }
}

/// Catalog statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}
