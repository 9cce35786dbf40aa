//! Course document chunking.
//!
//! Parses raw course documents and splits lesson text into overlapping,
//! sentence-aware chunks carrying structural context prefixes.

mod parser;
mod sentence;

pub use parser::{parse_document, ParsedDocument, ParsedLesson};
pub use sentence::{char_len, normalize_whitespace, pack_sentences, split_sentences};

use crate::course::{Chunk, CourseRecord};
use crate::error::{PensumError, Result};
use tracing::debug;

/// Configuration for chunking.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters of trailing context carried into the next chunk.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    /// Reject configurations that cannot make progress.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PensumError::Config("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(PensumError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A course and the chunks produced from its document.
#[derive(Debug, Clone)]
pub struct ChunkedCourse {
    pub course: CourseRecord,
    pub chunks: Vec<Chunk>,
}

/// Splits course documents into chunks.
pub struct DocumentChunker {
    config: ChunkingConfig,
}

impl DocumentChunker {
    /// Create a chunker, validating the configuration.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Parse a raw document and chunk every lesson.
    pub fn chunk_document(&self, raw: &str) -> Result<ChunkedCourse> {
        let parsed = parse_document(raw)?;
        let course = parsed.course;
        let mut chunks = Vec::new();
        let mut next_index = 0u32;

        for body in self.split_body(&parsed.preamble, 0)? {
            chunks.push(Chunk {
                course_title: course.title.clone(),
                lesson_number: None,
                chunk_index: next_index,
                text: body,
            });
            next_index += 1;
        }

        let last = parsed.lessons.len().saturating_sub(1);
        for (position, lesson) in parsed.lessons.iter().enumerate() {
            let n = lesson.record.lesson_number;
            let is_final = position == last;

            let (first_prefix, rest_prefix) = if is_final {
                let prefix = format!("Course {} Lesson {} content: ", course.title, n);
                (prefix.clone(), prefix)
            } else {
                (format!("Lesson {} content: ", n), String::new())
            };

            let reserved = char_len(&first_prefix).max(char_len(&rest_prefix));
            let bodies = self.split_body(&lesson.body, reserved)?;
            if bodies.is_empty() {
                debug!("Lesson {} of '{}' has no content", n, course.title);
            }

            for (i, body) in bodies.into_iter().enumerate() {
                let prefix = if i == 0 { &first_prefix } else { &rest_prefix };
                chunks.push(Chunk {
                    course_title: course.title.clone(),
                    lesson_number: Some(n),
                    chunk_index: next_index,
                    text: format!("{}{}", prefix, body),
                });
                next_index += 1;
            }
        }

        debug!(
            "Chunked '{}' into {} chunks across {} lessons",
            course.title,
            chunks.len(),
            course.lessons.len()
        );

        Ok(ChunkedCourse { course, chunks })
    }

    /// Sentence-pack a body, leaving `reserved` characters for a prefix.
    fn split_body(&self, text: &str, reserved: usize) -> Result<Vec<String>> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        if reserved >= self.config.chunk_size {
            return Err(PensumError::Config(format!(
                "context prefix of {} chars does not fit in chunk_size {}",
                reserved, self.config.chunk_size
            )));
        }
        let budget = self.config.chunk_size - reserved;

        let sentences = split_sentences(&normalized);
        Ok(pack_sentences(&sentences, budget, self.config.chunk_overlap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(lessons: &[(u32, &str)]) -> String {
        let mut text = String::from(
            "Course Title: Intro to MCP\nCourse Link: https://example.com/mcp\nCourse Instructor: Ada\n\n",
        );
        for (n, body) in lessons {
            text.push_str(&format!("Lesson {}: Lesson title {}\n{}\n\n", n, n, body));
        }
        text
    }

    fn long_body(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Fact number {} explains the protocol in some detail.", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn chunker(size: usize, overlap: usize) -> DocumentChunker {
        DocumentChunker::new(ChunkingConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(DocumentChunker::new(ChunkingConfig { chunk_size: 0, chunk_overlap: 0 }).is_err());
        assert!(DocumentChunker::new(ChunkingConfig { chunk_size: 100, chunk_overlap: 100 }).is_err());
        assert!(DocumentChunker::new(ChunkingConfig::default()).is_ok());
    }

    #[test]
    fn test_every_non_empty_lesson_gets_chunks() {
        let raw = doc(&[(0, &long_body(20)), (1, "Short lesson."), (2, &long_body(12))]);
        let result = chunker(300, 60).chunk_document(&raw).unwrap();

        for n in 0..3 {
            assert!(
                result.chunks.iter().any(|c| c.lesson_number == Some(n)),
                "lesson {} has no chunks",
                n
            );
        }
        assert!(result.chunks.iter().all(|c| char_len(&c.text) <= 300));
    }

    #[test]
    fn test_chunk_indices_are_monotonic() {
        let raw = doc(&[(0, &long_body(20)), (1, &long_body(20))]);
        let result = chunker(300, 60).chunk_document(&raw).unwrap();
        for (i, chunk) in result.chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
        }
    }

    #[test]
    fn test_context_prefixes() {
        let raw = doc(&[(0, &long_body(15)), (1, &long_body(15))]);
        let result = chunker(300, 60).chunk_document(&raw).unwrap();

        let lesson0: Vec<_> = result.chunks.iter().filter(|c| c.lesson_number == Some(0)).collect();
        assert!(lesson0.len() > 1);
        assert!(lesson0[0].text.starts_with("Lesson 0 content: "));
        assert!(lesson0[1..].iter().all(|c| !c.text.contains("content: ")));

        let lesson1: Vec<_> = result.chunks.iter().filter(|c| c.lesson_number == Some(1)).collect();
        assert!(lesson1.len() > 1);
        assert!(lesson1
            .iter()
            .all(|c| c.text.starts_with("Course Intro to MCP Lesson 1 content: ")));
    }

    #[test]
    fn test_adjacent_chunks_overlap() {
        let raw = doc(&[(0, &long_body(30)), (1, "Tail.")]);
        let result = chunker(300, 60).chunk_document(&raw).unwrap();
        let lesson0: Vec<_> = result.chunks.iter().filter(|c| c.lesson_number == Some(0)).collect();
        assert!(lesson0.len() > 2);

        let strip = |text: &str| text.trim_start_matches("Lesson 0 content: ").to_string();
        for pair in lesson0.windows(2) {
            let previous = split_sentences(&strip(&pair[0].text));
            let next = split_sentences(&strip(&pair[1].text));
            let carried = previous.last().unwrap();
            assert_eq!(next.first().unwrap(), carried);
            assert!(char_len(carried) <= 60);
        }
    }

    #[test]
    fn test_empty_lesson_yields_no_chunks() {
        let raw = doc(&[(0, ""), (1, "Something to say.")]);
        let result = chunker(300, 60).chunk_document(&raw).unwrap();
        assert!(result.chunks.iter().all(|c| c.lesson_number != Some(0)));
        assert_eq!(result.course.lessons.len(), 2);
    }

    #[test]
    fn test_body_shorter_than_overlap_is_single_chunk() {
        let raw = doc(&[(0, "Tiny."), (1, "Also tiny.")]);
        let result = chunker(300, 60).chunk_document(&raw).unwrap();
        assert_eq!(result.chunks.iter().filter(|c| c.lesson_number == Some(0)).count(), 1);
        assert_eq!(result.chunks[0].text, "Lesson 0 content: Tiny.");
    }

    #[test]
    fn test_document_without_lessons_is_course_level() {
        let raw = "Course Title: Notes\nJust some notes. Nothing else.";
        let result = chunker(300, 60).chunk_document(raw).unwrap();
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].lesson_number, None);
        assert_eq!(result.chunks[0].text, "Just some notes. Nothing else.");
    }

    #[test]
    fn test_long_title_prefix_stays_within_chunk_size() {
        let title = "T".repeat(90);
        let raw = format!(
            "Course Title: {}\n\nLesson 0: Only lesson\n{}\n",
            title,
            long_body(3)
        );
        let result = chunker(120, 20).chunk_document(&raw).unwrap();

        assert!(!result.chunks.is_empty());
        for chunk in &result.chunks {
            assert!(
                char_len(&chunk.text) <= 120,
                "chunk {} has {} chars",
                chunk.chunk_index,
                char_len(&chunk.text)
            );
            assert!(chunk.text.starts_with(&format!("Course {} Lesson 0 content: ", title)));
        }
    }

    #[test]
    fn test_prefix_longer_than_chunk_size_is_config_error() {
        let raw = format!("Course Title: {}\n\nLesson 0: Only lesson\nSome text.\n", "T".repeat(110));
        let err = chunker(120, 20).chunk_document(&raw).unwrap_err();
        assert!(matches!(err, PensumError::Config(_)));
    }
}
