//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! Catalog and content are separate tables; lessons are kept as JSON.

use super::{
    cosine_similarity, rank_catalog, rank_content, CatalogEntry, CatalogMatch, ContentEntry,
    ContentFilter, ContentMatch, IndexedCourse, VectorStore,
};
use crate::course::{Chunk, CourseRecord, LessonRecord};
use crate::error::{PensumError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS catalog (
        title TEXT PRIMARY KEY,
        link TEXT,
        instructor TEXT,
        lessons_json TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS content (
        course_title TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        lesson_number INTEGER,
        text TEXT NOT NULL,
        embedding BLOB NOT NULL,
        PRIMARY KEY (course_title, chunk_index)
    );

    CREATE INDEX IF NOT EXISTS idx_content_lesson ON content(course_title, lesson_number);
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open or create a store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PensumError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    /// Columns: title, link, instructor, lessons_json.
    fn course_from_row(row: &Row<'_>) -> rusqlite::Result<(CourseRecord, String)> {
        let course = CourseRecord {
            title: row.get(0)?,
            link: row.get(1)?,
            instructor: row.get(2)?,
            lessons: Vec::new(),
        };
        Ok((course, row.get(3)?))
    }

    fn with_lessons(mut course: CourseRecord, lessons_json: &str) -> Result<CourseRecord> {
        let lessons: Vec<LessonRecord> = serde_json::from_str(lessons_json)?;
        course.lessons = lessons;
        Ok(course)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, entry), fields(title = %entry.course.title))]
    async fn upsert_catalog(&self, entry: &CatalogEntry) -> Result<()> {
        let lessons_json = serde_json::to_string(&entry.course.lessons)?;
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO catalog
            (title, link, instructor, lessons_json, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.course.title,
                entry.course.link,
                entry.course.instructor,
                lessons_json,
                Self::embedding_to_bytes(&entry.embedding),
                entry.indexed_at.to_rfc3339(),
            ],
        )?;
        debug!("Upserted catalog entry");
        Ok(())
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn upsert_content(&self, entries: &[ContentEntry]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for entry in entries {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO content
                (course_title, chunk_index, lesson_number, text, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    entry.chunk.course_title,
                    entry.chunk.chunk_index,
                    entry.chunk.lesson_number,
                    entry.chunk.text,
                    Self::embedding_to_bytes(&entry.embedding),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} chunks", entries.len());
        Ok(entries.len())
    }

    #[instrument(skip(self, embedding))]
    async fn query_catalog(&self, embedding: &[f32], limit: usize) -> Result<Vec<CatalogMatch>> {
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                "SELECT title, link, instructor, lessons_json, embedding FROM catalog",
            )?;
            let rows = stmt.query_map([], |row| {
                let (course, lessons_json) = Self::course_from_row(row)?;
                let bytes: Vec<u8> = row.get(4)?;
                Ok((course, lessons_json, bytes))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut matches = Vec::with_capacity(rows.len());
        for (course, lessons_json, bytes) in rows {
            matches.push(CatalogMatch {
                score: cosine_similarity(embedding, &Self::bytes_to_embedding(&bytes)),
                course: Self::with_lessons(course, &lessons_json)?,
            });
        }

        rank_catalog(&mut matches, limit);
        Ok(matches)
    }

    #[instrument(skip(self, embedding))]
    async fn query_content(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &ContentFilter,
    ) -> Result<Vec<ContentMatch>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT course_title, chunk_index, lesson_number, text, embedding
            FROM content
            WHERE (?1 IS NULL OR course_title = ?1)
              AND (?2 IS NULL OR lesson_number = ?2)
            "#,
        )?;

        let rows = stmt.query_map(params![filter.course_title, filter.lesson_number], |row| {
            let bytes: Vec<u8> = row.get(4)?;
            Ok(ContentMatch {
                chunk: Chunk {
                    course_title: row.get(0)?,
                    chunk_index: row.get(1)?,
                    lesson_number: row.get(2)?,
                    text: row.get(3)?,
                },
                score: cosine_similarity(embedding, &Self::bytes_to_embedding(&bytes)),
            })
        })?;

        let mut matches = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        rank_content(&mut matches, limit);

        debug!("Found {} matching chunks", matches.len());
        Ok(matches)
    }

    async fn get_course(&self, title: &str) -> Result<Option<CourseRecord>> {
        let row = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT title, link, instructor, lessons_json FROM catalog WHERE title = ?1",
                params![title],
                Self::course_from_row,
            )
            .optional()?
        };

        row.map(|(course, lessons_json)| Self::with_lessons(course, &lessons_json))
            .transpose()
    }

    #[instrument(skip(self))]
    async fn list_courses(&self) -> Result<Vec<IndexedCourse>> {
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                r#"
                SELECT c.title, c.link, c.instructor, c.lessons_json, c.indexed_at,
                       (SELECT COUNT(*) FROM content WHERE course_title = c.title)
                FROM catalog c
                ORDER BY c.title
                "#,
            )?;
            let rows = stmt.query_map([], |row| {
                let (course, lessons_json) = Self::course_from_row(row)?;
                let indexed_at: String = row.get(4)?;
                let chunk_count: u32 = row.get(5)?;
                Ok((course, lessons_json, indexed_at, chunk_count))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        rows.into_iter()
            .map(|(course, lessons_json, indexed_at, chunk_count)| {
                Ok(IndexedCourse {
                    course: Self::with_lessons(course, &lessons_json)?,
                    chunk_count,
                    indexed_at: Self::parse_timestamp(&indexed_at),
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn delete_course(&self, title: &str) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM catalog WHERE title = ?1", params![title])?;
        let deleted = tx.execute("DELETE FROM content WHERE course_title = ?1", params![title])?;
        tx.commit()?;

        info!("Deleted {} chunks for course '{}'", deleted, title);
        Ok(deleted)
    }

    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM content; DELETE FROM catalog;")?;
        info!("Cleared all courses");
        Ok(())
    }

    async fn content_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM content", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
