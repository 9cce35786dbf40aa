//! Course document parsing.
//!
//! Documents start with a header block followed by lesson blocks:
//!
//! ```text
//! Course Title: Intro to MCP
//! Course Link: https://example.com/mcp
//! Course Instructor: Ada Lovelace
//!
//! Lesson 0: Welcome
//! Lesson Link: https://example.com/mcp/0
//! Body text...
//! ```

use crate::course::{CourseRecord, LessonRecord};
use crate::error::{PensumError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^course\s+title:\s*(.*)$").expect("valid regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^course\s+link:\s*(.*)$").expect("valid regex"));
static INSTRUCTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^course\s+instructor:\s*(.*)$").expect("valid regex"));
static LESSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^lesson\s+(\d+):\s*(.+)$").expect("valid regex"));
static LESSON_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^lesson\s+link:\s*(.*)$").expect("valid regex"));

/// A parsed lesson with its raw body.
#[derive(Debug, Clone)]
pub struct ParsedLesson {
    pub record: LessonRecord,
    pub body: String,
}

/// A parsed course document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Course fields from the header (lessons filled in).
    pub course: CourseRecord,
    /// Text between the header and the first lesson.
    pub preamble: String,
    /// Lessons in document order.
    pub lessons: Vec<ParsedLesson>,
}

/// Parse a raw course document.
pub fn parse_document(raw: &str) -> Result<ParsedDocument> {
    let lines: Vec<&str> = raw.lines().map(str::trim_end).collect();
    let mut pos = lines.iter().position(|l| !l.trim().is_empty()).ok_or_else(|| {
        PensumError::MalformedDocument("document is empty".to_string())
    })?;

    let title = TITLE_RE
        .captures(lines[pos].trim())
        .map(|c| c[1].trim().to_string())
        .ok_or_else(|| {
            PensumError::MalformedDocument(format!(
                "expected 'Course Title:' header, found '{}'",
                truncate(lines[pos].trim(), 80)
            ))
        })?;
    if title.is_empty() {
        return Err(PensumError::MalformedDocument(
            "course title is empty".to_string(),
        ));
    }
    pos += 1;

    let mut course = CourseRecord::new(title);

    // Remaining header lines, in any order.
    while pos < lines.len() {
        let line = lines[pos].trim();
        if line.is_empty() {
            pos += 1;
        } else if let Some(c) = LINK_RE.captures(line) {
            course.link = non_empty(&c[1]);
            pos += 1;
        } else if let Some(c) = INSTRUCTOR_RE.captures(line) {
            course.instructor = non_empty(&c[1]);
            pos += 1;
        } else {
            break;
        }
    }

    let mut preamble = Vec::new();
    let mut lessons: Vec<ParsedLesson> = Vec::new();
    let mut seen = HashSet::new();
    let mut body: Vec<&str> = Vec::new();
    let mut awaiting_link = false;

    for line in &lines[pos..] {
        let trimmed = line.trim();

        if let Some(c) = LESSON_RE.captures(trimmed) {
            let lesson_number: u32 = c[1].parse().map_err(|_| {
                PensumError::MalformedDocument(format!("invalid lesson number '{}'", &c[1]))
            })?;
            if !seen.insert(lesson_number) {
                return Err(PensumError::MalformedDocument(format!(
                    "duplicate lesson number {} in '{}'",
                    lesson_number, course.title
                )));
            }
            if let Some(last) = lessons.last_mut() {
                last.body = body.join("\n");
            }
            body.clear();
            lessons.push(ParsedLesson {
                record: LessonRecord {
                    lesson_number,
                    title: c[2].trim().to_string(),
                    link: None,
                },
                body: String::new(),
            });
            awaiting_link = true;
            continue;
        }

        if awaiting_link && !trimmed.is_empty() {
            awaiting_link = false;
            if let Some(c) = LESSON_LINK_RE.captures(trimmed) {
                if let Some(last) = lessons.last_mut() {
                    last.record.link = non_empty(&c[1]);
                }
                continue;
            }
        }

        if lessons.is_empty() {
            preamble.push(*line);
        } else {
            body.push(*line);
        }
    }

    if let Some(last) = lessons.last_mut() {
        last.body = body.join("\n");
    }

    course.lessons = lessons.iter().map(|l| l.record.clone()).collect();

    Ok(ParsedDocument {
        course,
        preamble: preamble.join("\n"),
        lessons,
    })
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
Course Title: Intro to MCP
Course Link: https://example.com/mcp
Course Instructor: Ada Lovelace

Lesson 0: Welcome
Lesson Link: https://example.com/mcp/0
MCP stands for Model Context Protocol. It connects models to tools.

Lesson 1: Servers
Servers expose resources.
";

    #[test]
    fn test_parse_header_and_lessons() {
        let doc = parse_document(DOC).unwrap();
        assert_eq!(doc.course.title, "Intro to MCP");
        assert_eq!(doc.course.link.as_deref(), Some("https://example.com/mcp"));
        assert_eq!(doc.course.instructor.as_deref(), Some("Ada Lovelace"));
        assert_eq!(doc.lessons.len(), 2);
        assert_eq!(doc.lessons[0].record.title, "Welcome");
        assert_eq!(
            doc.lessons[0].record.link.as_deref(),
            Some("https://example.com/mcp/0")
        );
        assert!(doc.lessons[0].body.contains("Model Context Protocol"));
        assert!(!doc.lessons[0].body.contains("Lesson Link"));
        assert_eq!(doc.lessons[1].record.link, None);
        assert_eq!(doc.course.lessons.len(), 2);
    }

    #[test]
    fn test_header_is_case_insensitive_and_optional() {
        let doc = parse_document("\n\ncourse title: Rust Basics\nLESSON 1: Ownership\nBorrowing rules.").unwrap();
        assert_eq!(doc.course.title, "Rust Basics");
        assert_eq!(doc.course.instructor, None);
        assert_eq!(doc.lessons[0].record.lesson_number, 1);
    }

    #[test]
    fn test_missing_title_is_malformed() {
        let err = parse_document("Lesson 1: Nope\nBody").unwrap_err();
        assert!(matches!(err, PensumError::MalformedDocument(_)));

        let err = parse_document("Course Title:   \nLesson 1: Nope").unwrap_err();
        assert!(matches!(err, PensumError::MalformedDocument(_)));

        let err = parse_document("   \n \n").unwrap_err();
        assert!(matches!(err, PensumError::MalformedDocument(_)));
    }

    #[test]
    fn test_duplicate_lesson_numbers_are_malformed() {
        let err = parse_document("Course Title: X\nLesson 1: A\nfoo\nLesson 1: B\nbar").unwrap_err();
        assert!(matches!(err, PensumError::MalformedDocument(_)));
    }

    #[test]
    fn test_preamble_before_first_lesson() {
        let doc = parse_document("Course Title: X\nSome overview text.\nLesson 1: A\nbody").unwrap();
        assert_eq!(doc.preamble.trim(), "Some overview text.");
        assert_eq!(doc.lessons.len(), 1);
    }
}
