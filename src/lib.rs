//! Pensum - question answering over course transcripts
//!
//! Ingests course documents into a searchable index and answers questions
//! about them with a language model that can search course content.
//!
//! The name comes from the Latin "pensum", a set portion of study.
//!
//! # Architecture
//!
//! - `chunking` - Course document parsing and sentence-aware chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Catalog and content storage with similarity search
//! - `index` - Course name resolution and filtered content search
//! - `llm` - Completion model interface and providers
//! - `agent` - Search tool and the tool-use loop
//! - `history` - Per-session conversation history
//! - `orchestrator` - Ingestion and question answering facade
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use pensum::config::Settings;
//! use pensum::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     orchestrator.ingest_folder(std::path::Path::new("docs"), false).await?;
//!     let answer = orchestrator.answer_query("What is MCP?", None).await?;
//!     println!("{}", answer.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod course;
pub mod embedding;
pub mod error;
pub mod history;
pub mod index;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use error::{PensumError, Result};
