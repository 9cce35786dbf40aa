//! Error types for Pensum.

use thiserror::Error;

/// Library-level error type for Pensum operations.
#[derive(Error, Debug)]
pub enum PensumError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed course document: {0}")]
    MalformedDocument(String),

    #[error("Upstream generation failed: {0}")]
    UpstreamGeneration(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PensumError {
    /// Whether this error is a transport failure of an external embedding or
    /// completion service. Only these may terminate a query abnormally.
    pub fn is_upstream(&self) -> bool {
        matches!(self, PensumError::UpstreamGeneration(_) | PensumError::Http(_))
    }
}

/// Result type alias for Pensum operations.
pub type Result<T> = std::result::Result<T, PensumError>;
