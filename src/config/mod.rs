//! Configuration module for Pensum.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{GenerationPrompts, Prompts};
pub use settings::{
    ChunkingSettings, DocumentSettings, EmbeddingProvider, EmbeddingSettings, GeneralSettings,
    GenerationProvider, GenerationSettings, HistorySettings, PromptSettings, SearchSettings,
    Settings, StoreProvider, VectorStoreSettings,
};
