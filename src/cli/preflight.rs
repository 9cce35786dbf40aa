//! Pre-flight checks before expensive operations.
//!
//! Validates that the API keys the configured providers need are present
//! before starting operations that would otherwise fail midway.

use crate::config::{EmbeddingProvider, Settings, StoreProvider};
use crate::error::{PensumError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion embeds documents.
    Ingest,
    /// Answering embeds the query and calls the completion model.
    Ask,
    /// Search embeds the query.
    Search,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    if settings.embedding.provider == EmbeddingProvider::OpenAI {
        check_api_key("OPENAI_API_KEY")?;
    }
    if let Operation::Ask = operation {
        check_api_key(settings.generation.provider.api_key_var())?;
    }
    Ok(())
}

/// Whether the index is lost when the process exits.
pub fn is_ephemeral(settings: &Settings) -> bool {
    settings.vector_store.provider == StoreProvider::Memory
}

fn check_api_key(var: &str) -> Result<()> {
    let hint = match var {
        "ANTHROPIC_API_KEY" => "sk-ant-...",
        _ => "sk-...",
    };
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(()),
        Ok(_) => Err(PensumError::Config(format!(
            "{} is empty. Set it with: export {}='{}'",
            var, var, hint
        ))),
        Err(_) => Err(PensumError::Config(format!(
            "{} not set. Set it with: export {}='{}'",
            var, var, hint
        ))),
    }
}

/// Provider summary shown by the CLI.
pub fn describe(settings: &Settings) -> String {
    format!(
        "{} / {} embeddings / {} store",
        settings.generation.provider, settings.embedding.provider, settings.vector_store.provider
    )
}
