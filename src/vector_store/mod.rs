//! Vector store abstraction for Pensum.
//!
//! Two typed namespaces live side by side: the course catalog, used only to
//! resolve course names, and the chunk content that searches return.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::config::{Settings, StoreProvider};
use crate::course::{Chunk, CourseRecord};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// A course in the catalog namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub course: CourseRecord,
    /// Embedding of [`CourseRecord::catalog_text`].
    pub embedding: Vec<f32>,
    pub indexed_at: DateTime<Utc>,
}

impl CatalogEntry {
    pub fn new(course: CourseRecord, embedding: Vec<f32>) -> Self {
        Self {
            course,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A chunk in the content namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A catalog hit.
#[derive(Debug, Clone)]
pub struct CatalogMatch {
    pub course: CourseRecord,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// A content hit.
#[derive(Debug, Clone)]
pub struct ContentMatch {
    pub chunk: Chunk,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Summary of an indexed course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedCourse {
    pub course: CourseRecord,
    /// Number of stored chunks.
    pub chunk_count: u32,
    pub indexed_at: DateTime<Utc>,
}

/// Metadata filter applied to content queries. Empty fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

impl ContentFilter {
    pub fn is_empty(&self) -> bool {
        self.course_title.is_none() && self.lesson_number.is_none()
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.course_title
            .as_ref()
            .is_none_or(|title| &chunk.course_title == title)
            && self
                .lesson_number
                .is_none_or(|n| chunk.lesson_number == Some(n))
    }
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a catalog entry, keyed by course title.
    async fn upsert_catalog(&self, entry: &CatalogEntry) -> Result<()>;

    /// Insert or replace content entries, keyed by (course title, chunk index).
    async fn upsert_content(&self, entries: &[ContentEntry]) -> Result<usize>;

    /// Nearest catalog entries.
    async fn query_catalog(&self, embedding: &[f32], limit: usize) -> Result<Vec<CatalogMatch>>;

    /// Nearest content entries passing `filter`, ordered by [`rank_content`].
    async fn query_content(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &ContentFilter,
    ) -> Result<Vec<ContentMatch>>;

    /// Get a course by exact title.
    async fn get_course(&self, title: &str) -> Result<Option<CourseRecord>>;

    /// List indexed courses, ordered by title.
    async fn list_courses(&self) -> Result<Vec<IndexedCourse>>;

    /// Remove a course from both namespaces. Returns the number of chunks removed.
    async fn delete_course(&self, title: &str) -> Result<usize>;

    /// Remove everything.
    async fn clear(&self) -> Result<()>;

    /// Total number of stored chunks.
    async fn content_count(&self) -> Result<usize>;
}

/// Build the store selected in settings.
pub fn create_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    Ok(match settings.vector_store.provider {
        StoreProvider::Sqlite => Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?),
        StoreProvider::Memory => Arc::new(MemoryVectorStore::new()),
    })
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort by score descending, ties by ascending chunk index then course title, and truncate.
pub fn rank_content(matches: &mut Vec<ContentMatch>, limit: usize) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
            .then_with(|| a.chunk.course_title.cmp(&b.chunk.course_title))
    });
    matches.truncate(limit);
}

/// Sort catalog hits by score descending, ties by title, and truncate.
pub fn rank_catalog(matches: &mut Vec<CatalogMatch>, limit: usize) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.course.title.cmp(&b.course.title))
    });
    matches.truncate(limit);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(title: &str, lesson: Option<u32>, index: u32) -> Chunk {
        Chunk {
            course_title: title.to_string(),
            lesson_number: lesson,
            chunk_index: index,
            text: format!("chunk {}", index),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_content_filter() {
        let any = ContentFilter::default();
        assert!(any.is_empty());
        assert!(any.matches(&chunk("A", None, 0)));

        let by_lesson = ContentFilter {
            course_title: Some("A".to_string()),
            lesson_number: Some(2),
        };
        assert!(by_lesson.matches(&chunk("A", Some(2), 3)));
        assert!(!by_lesson.matches(&chunk("A", Some(1), 3)));
        assert!(!by_lesson.matches(&chunk("B", Some(2), 3)));
        assert!(!by_lesson.matches(&chunk("A", None, 3)));
    }

    #[test]
    fn test_rank_content_breaks_ties_by_chunk_index() {
        let mut matches = vec![
            ContentMatch { chunk: chunk("A", Some(0), 5), score: 0.5 },
            ContentMatch { chunk: chunk("A", Some(0), 2), score: 0.5 },
            ContentMatch { chunk: chunk("A", Some(0), 9), score: 0.9 },
        ];
        rank_content(&mut matches, 2);
        let order: Vec<u32> = matches.iter().map(|m| m.chunk.chunk_index).collect();
        assert_eq!(order, vec![9, 2]);

        let mut matches = vec![
            ContentMatch { chunk: chunk("B", Some(0), 0), score: 0.5 },
            ContentMatch { chunk: chunk("A", Some(1), 5), score: 0.5 },
            ContentMatch { chunk: chunk("A", Some(0), 0), score: 0.5 },
        ];
        rank_content(&mut matches, 10);
        let order: Vec<(&str, u32)> = matches
            .iter()
            .map(|m| (m.chunk.course_title.as_str(), m.chunk.chunk_index))
            .collect();
        assert_eq!(order, vec![("A", 0), ("B", 0), ("A", 5)]);
    }
}
