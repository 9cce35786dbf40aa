//! Course data model shared by ingestion, indexing and retrieval.

use serde::{Deserialize, Serialize};

/// A lesson within a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRecord {
    /// Lesson number, unique within its course.
    pub lesson_number: u32,
    /// Lesson title.
    pub title: String,
    /// Link to the lesson (if the document provides one).
    pub link: Option<String>,
}

/// Canonical course identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    /// Course title (unique key).
    pub title: String,
    /// Link to the course.
    pub link: Option<String>,
    /// Course instructor.
    pub instructor: Option<String>,
    /// Lessons in document order.
    pub lessons: Vec<LessonRecord>,
}

impl CourseRecord {
    /// Create a course without lessons.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: None,
            instructor: None,
            lessons: Vec::new(),
        }
    }

    /// Look up a lesson by number.
    pub fn lesson(&self, lesson_number: u32) -> Option<&LessonRecord> {
        self.lessons.iter().find(|l| l.lesson_number == lesson_number)
    }

    /// Text embedded into the catalog namespace for name resolution.
    pub fn catalog_text(&self) -> String {
        let mut text = self.title.clone();
        if let Some(instructor) = &self.instructor {
            text.push_str(&format!("\nInstructor: {}", instructor));
        }
        if !self.lessons.is_empty() {
            let titles = self
                .lessons
                .iter()
                .map(|l| l.title.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            text.push_str(&format!("\nLessons: {}", titles));
        }
        text
    }
}

/// A bounded span of lesson text with retrieval metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Title of the owning course.
    pub course_title: String,
    /// Owning lesson, `None` for course-level text.
    pub lesson_number: Option<u32>,
    /// Position of this chunk within the course, increasing through every lesson.
    pub chunk_index: u32,
    /// Chunk text, including any context prefix.
    pub text: String,
}

impl Chunk {
    /// Stable identifier in the content namespace.
    pub fn id(&self) -> String {
        format!("{}_{}", self.course_title.replace(' ', "_"), self.chunk_index)
    }
}

/// A human-readable citation attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    /// Display label, e.g. "Intro to MCP - Lesson 2".
    pub label: String,
    /// Link to the lesson or course, when known.
    pub link: Option<String>,
}

/// Label shared by search result headers and source references.
pub fn source_label(course_title: &str, lesson_number: Option<u32>) -> String {
    match lesson_number {
        Some(n) => format!("{} - Lesson {}", course_title, n),
        None => course_title.to_string(),
    }
}
