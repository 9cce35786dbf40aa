//! In-memory vector store implementation.
//!
//! Useful for testing and offline runs.

use super::{
    cosine_similarity, rank_catalog, rank_content, CatalogEntry, CatalogMatch, ContentEntry,
    ContentFilter, ContentMatch, IndexedCourse, VectorStore,
};
use crate::course::CourseRecord;
use crate::error::{PensumError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Namespaces {
    catalog: BTreeMap<String, CatalogEntry>,
    content: HashMap<(String, u32), ContentEntry>,
}

/// In-memory vector store.
#[derive(Default)]
pub struct MemoryVectorStore {
    inner: RwLock<Namespaces>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Namespaces>> {
        self.inner
            .read()
            .map_err(|e| PensumError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Namespaces>> {
        self.inner
            .write()
            .map_err(|e| PensumError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_catalog(&self, entry: &CatalogEntry) -> Result<()> {
        let mut store = self.write()?;
        store.catalog.insert(entry.course.title.clone(), entry.clone());
        Ok(())
    }

    async fn upsert_content(&self, entries: &[ContentEntry]) -> Result<usize> {
        let mut store = self.write()?;
        for entry in entries {
            let key = (entry.chunk.course_title.clone(), entry.chunk.chunk_index);
            store.content.insert(key, entry.clone());
        }
        Ok(entries.len())
    }

    async fn query_catalog(&self, embedding: &[f32], limit: usize) -> Result<Vec<CatalogMatch>> {
        let store = self.read()?;
        let mut matches: Vec<CatalogMatch> = store
            .catalog
            .values()
            .map(|entry| CatalogMatch {
                course: entry.course.clone(),
                score: cosine_similarity(embedding, &entry.embedding),
            })
            .collect();
        rank_catalog(&mut matches, limit);
        Ok(matches)
    }

    async fn query_content(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &ContentFilter,
    ) -> Result<Vec<ContentMatch>> {
        let store = self.read()?;
        let mut matches: Vec<ContentMatch> = store
            .content
            .values()
            .filter(|entry| filter.matches(&entry.chunk))
            .map(|entry| ContentMatch {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(embedding, &entry.embedding),
            })
            .collect();
        rank_content(&mut matches, limit);
        Ok(matches)
    }

    async fn get_course(&self, title: &str) -> Result<Option<CourseRecord>> {
        let store = self.read()?;
        Ok(store.catalog.get(title).map(|entry| entry.course.clone()))
    }

    async fn list_courses(&self) -> Result<Vec<IndexedCourse>> {
        let store = self.read()?;
        let courses = store
            .catalog
            .values()
            .map(|entry| IndexedCourse {
                course: entry.course.clone(),
                chunk_count: store
                    .content
                    .keys()
                    .filter(|(title, _)| title == &entry.course.title)
                    .count() as u32,
                indexed_at: entry.indexed_at,
            })
            .collect();
        Ok(courses)
    }

    async fn delete_course(&self, title: &str) -> Result<usize> {
        let mut store = self.write()?;
        store.catalog.remove(title);
        let before = store.content.len();
        store.content.retain(|(course, _), _| course != title);
        Ok(before - store.content.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut store = self.write()?;
        store.catalog.clear();
        store.content.clear();
        Ok(())
    }

    async fn content_count(&self) -> Result<usize> {
        Ok(self.read()?.content.len())
    }
}
