//! Two-stage course index: catalog name resolution, then filtered content search.

use crate::course::{Chunk, CourseRecord, LessonRecord};
use crate::embedding::Embedder;
use crate::error::{PensumError, Result};
use crate::vector_store::{CatalogEntry, ContentEntry, ContentFilter, IndexedCourse, VectorStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default number of chunks returned by a search.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// A content hit with its resolved course metadata.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
    pub course: Option<CourseRecord>,
}

impl SearchHit {
    /// The lesson this hit belongs to, if known.
    pub fn lesson(&self) -> Option<&LessonRecord> {
        let n = self.chunk.lesson_number?;
        self.course.as_ref()?.lesson(n)
    }

    /// Lesson link, falling back to the course link.
    pub fn link(&self) -> Option<String> {
        self.lesson()
            .and_then(|l| l.link.clone())
            .or_else(|| self.course.as_ref().and_then(|c| c.link.clone()))
    }
}

/// Result of a content search.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// Ranked hits; may be empty.
    Found(Vec<SearchHit>),
    /// A course name was given and the catalog is empty.
    CourseNotFound(String),
}

/// Course catalog and content index over a vector store.
pub struct CourseIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
}

impl CourseIndex {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Set how many chunks a search returns.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Add a course and its chunks. Returns `false` without embedding
    /// anything when a course with the same title is already indexed.
    #[instrument(skip(self, course, chunks), fields(title = %course.title, chunks = chunks.len()))]
    pub async fn upsert_course(&self, course: &CourseRecord, chunks: &[Chunk]) -> Result<bool> {
        if self.store.get_course(&course.title).await?.is_some() {
            debug!("Course already indexed, skipping");
            return Ok(false);
        }

        if let Some(stray) = chunks.iter().find(|c| c.course_title != course.title) {
            return Err(PensumError::InvalidInput(format!(
                "chunk {} belongs to '{}', not '{}'",
                stray.chunk_index, stray.course_title, course.title
            )));
        }

        let catalog_embedding = self.embedder.embed(&course.catalog_text()).await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(PensumError::UpstreamGeneration(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let entries: Vec<ContentEntry> = chunks
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| ContentEntry { chunk, embedding })
            .collect();

        // Content first, so a failure never leaves a catalog entry that
        // would make re-ingestion skip the course.
        self.store.upsert_content(&entries).await?;
        self.store
            .upsert_catalog(&CatalogEntry::new(course.clone(), catalog_embedding))
            .await?;

        info!("Indexed course '{}' with {} chunks", course.title, chunks.len());
        Ok(true)
    }

    /// Resolve a possibly partial course name to the closest indexed course.
    #[instrument(skip(self))]
    pub async fn resolve_course_name(&self, raw: &str) -> Result<Option<CourseRecord>> {
        let embedding = self.embedder.embed(raw).await?;
        let best = self.store.query_catalog(&embedding, 1).await?.into_iter().next();
        if let Some(hit) = &best {
            debug!("Resolved '{}' to '{}' (score {:.3})", raw, hit.course.title, hit.score);
        }
        Ok(best.map(|hit| hit.course))
    }

    /// Search course content, optionally scoped to a course and/or lesson.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<SearchOutcome> {
        let resolved = match course_name {
            Some(name) => match self.resolve_course_name(name).await? {
                Some(course) => Some(course),
                None => return Ok(SearchOutcome::CourseNotFound(name.to_string())),
            },
            None => None,
        };

        let filter = ContentFilter {
            course_title: resolved.as_ref().map(|c| c.title.clone()),
            lesson_number,
        };

        let embedding = self.embedder.embed(query).await?;
        let matches = self
            .store
            .query_content(&embedding, self.max_results, &filter)
            .await?;

        let mut hits = Vec::with_capacity(matches.len());
        for m in matches {
            let course = match &resolved {
                Some(course) if course.title == m.chunk.course_title => Some(course.clone()),
                _ => self.store.get_course(&m.chunk.course_title).await?,
            };
            hits.push(SearchHit {
                chunk: m.chunk,
                score: m.score,
                course,
            });
        }

        debug!("Search returned {} hits", hits.len());
        Ok(SearchOutcome::Found(hits))
    }

    /// Titles of every indexed course.
    pub async fn existing_course_titles(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .store
            .list_courses()
            .await?
            .into_iter()
            .map(|c| c.course.title)
            .collect())
    }

    pub async fn course(&self, title: &str) -> Result<Option<CourseRecord>> {
        self.store.get_course(title).await
    }

    pub async fn courses(&self) -> Result<Vec<IndexedCourse>> {
        self.store.list_courses().await
    }

    pub async fn course_count(&self) -> Result<usize> {
        Ok(self.store.list_courses().await?.len())
    }

    pub async fn course_link(&self, title: &str) -> Result<Option<String>> {
        Ok(self.store.get_course(title).await?.and_then(|c| c.link))
    }

    pub async fn lesson_link(&self, title: &str, lesson_number: u32) -> Result<Option<String>> {
        Ok(self
            .store
            .get_course(title)
            .await?
            .and_then(|c| c.lesson(lesson_number).and_then(|l| l.link.clone())))
    }

    /// Remove a course so it can be re-ingested.
    pub async fn remove_course(&self, title: &str) -> Result<usize> {
        self.store.delete_course(title).await
    }

    /// Remove every course.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }

    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.content_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::TrigramEmbedder;
    use crate::vector_store::{MemoryVectorStore, SqliteVectorStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls through to a trigram embedder.
    struct CountingEmbedder {
        inner: TrigramEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
    }

    fn course(title: &str, link: Option<&str>) -> CourseRecord {
        CourseRecord {
            title: title.to_string(),
            link: link.map(str::to_string),
            instructor: None,
            lessons: vec![
                LessonRecord {
                    lesson_number: 1,
                    title: "Basics".to_string(),
                    link: Some(format!("https://example.com/{}/1", title.len())),
                },
                LessonRecord {
                    lesson_number: 2,
                    title: "Advanced".to_string(),
                    link: None,
                },
            ],
        }
    }

    fn chunks(title: &str, texts: &[(u32, &str)]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, (lesson, text))| Chunk {
                course_title: title.to_string(),
                lesson_number: Some(*lesson),
                chunk_index: i as u32,
                text: text.to_string(),
            })
            .collect()
    }

    fn index() -> CourseIndex {
        CourseIndex::new(Arc::new(MemoryVectorStore::new()), Arc::new(TrigramEmbedder::new(384)))
    }

    async fn seeded() -> CourseIndex {
        let index = index();
        index
            .upsert_course(
                &course("Intro to MCP", Some("https://example.com/mcp")),
                &chunks(
                    "Intro to MCP",
                    &[
                        (1, "MCP servers expose tools and resources to clients."),
                        (2, "Advanced MCP transports include stdio and streaming HTTP."),
                    ],
                ),
            )
            .await
            .unwrap();
        index
            .upsert_course(
                &course("Retrieval with Chroma", None),
                &chunks(
                    "Retrieval with Chroma",
                    &[(1, "Chroma stores embeddings in collections for retrieval.")],
                ),
            )
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_without_embedding() {
        let embedder = Arc::new(CountingEmbedder {
            inner: TrigramEmbedder::new(128),
            calls: AtomicUsize::new(0),
        });
        let index = CourseIndex::new(Arc::new(SqliteVectorStore::in_memory().unwrap()), embedder.clone());

        let c = course("Intro to MCP", None);
        let ch = chunks("Intro to MCP", &[(1, "One."), (2, "Two.")]);

        assert!(index.upsert_course(&c, &ch).await.unwrap());
        let calls = embedder.calls.load(Ordering::SeqCst);
        assert!(calls > 0);

        assert!(!index.upsert_course(&c, &ch).await.unwrap());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls);

        assert_eq!(index.chunk_count().await.unwrap(), 2);
        assert_eq!(
            index.existing_course_titles().await.unwrap(),
            BTreeSet::from(["Intro to MCP".to_string()])
        );
    }

    #[tokio::test]
    async fn test_resolve_exact_and_partial_names() {
        let index = seeded().await;
        let exact = index.resolve_course_name("Intro to MCP").await.unwrap().unwrap();
        assert_eq!(exact.title, "Intro to MCP");

        let partial = index.resolve_course_name("chroma").await.unwrap().unwrap();
        assert_eq!(partial.title, "Retrieval with Chroma");
    }

    #[tokio::test]
    async fn test_resolve_on_empty_catalog() {
        let index = index();
        assert!(index.resolve_course_name("anything").await.unwrap().is_none());
        let outcome = index.search("what?", Some("Nope"), None).await.unwrap();
        assert!(matches!(outcome, SearchOutcome::CourseNotFound(name) if name == "Nope"));
    }

    #[tokio::test]
    async fn test_search_filters_by_course_and_lesson() {
        let index = seeded().await;

        let SearchOutcome::Found(hits) = index.search("transports", Some("MCP"), Some(2)).await.unwrap() else {
            panic!("expected hits");
        };
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.course_title, "Intro to MCP");
        assert_eq!(hits[0].chunk.lesson_number, Some(2));
        // Lesson 2 has no link, so the course link is used.
        assert_eq!(hits[0].link().as_deref(), Some("https://example.com/mcp"));

        let SearchOutcome::Found(hits) = index.search("embeddings", None, None).await.unwrap() else {
            panic!("expected hits");
        };
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk.course_title, "Retrieval with Chroma");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_search_with_empty_lesson_returns_no_hits() {
        let index = seeded().await;
        let SearchOutcome::Found(hits) = index.search("anything", Some("Intro to MCP"), Some(99)).await.unwrap() else {
            panic!("expected empty hits");
        };
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_max_results_limit() {
        let index = seeded().await.with_max_results(1);
        let SearchOutcome::Found(hits) = index.search("MCP", None, None).await.unwrap() else {
            panic!("expected hits");
        };
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_metadata_lookups_and_removal() {
        let index = seeded().await;
        assert_eq!(index.course_count().await.unwrap(), 2);
        assert_eq!(
            index.course_link("Intro to MCP").await.unwrap().as_deref(),
            Some("https://example.com/mcp")
        );
        assert!(index.lesson_link("Intro to MCP", 1).await.unwrap().is_some());
        assert!(index.lesson_link("Intro to MCP", 2).await.unwrap().is_none());

        assert_eq!(index.remove_course("Intro to MCP").await.unwrap(), 2);
        assert_eq!(index.course_count().await.unwrap(), 1);

        index.clear().await.unwrap();
        assert!(index.existing_course_titles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_foreign_chunks() {
        let index = index();
        let err = index
            .upsert_course(&course("A", None), &chunks("B", &[(1, "x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, PensumError::InvalidInput(_)));
    }
}
