//! Embedding generation for course name resolution and content search.

mod openai;
mod trigram;

pub use openai::OpenAIEmbedder;
pub use trigram::TrigramEmbedder;

use crate::config::{EmbeddingProvider, Settings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Build the embedder selected in settings.
pub fn create_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let dimensions = settings.embedding.dimensions as usize;
    Ok(match settings.embedding.provider {
        EmbeddingProvider::OpenAI => Arc::new(OpenAIEmbedder::new(
            &settings.embedding.model,
            dimensions,
            Duration::from_secs(settings.generation.timeout_seconds),
        )?),
        EmbeddingProvider::Trigram => Arc::new(TrigramEmbedder::new(dimensions)),
    })
}
