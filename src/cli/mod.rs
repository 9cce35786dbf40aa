//! CLI module for Pensum.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pensum - Question answering over course transcripts
///
/// Ingests course documents into a searchable index and answers questions
/// about them with a tool-using language model.
#[derive(Parser, Debug)]
#[command(name = "pensum")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "PENSUM_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a course document or a folder of documents
    Ingest {
        /// Course document (.txt/.md) or folder of documents
        path: PathBuf,

        /// Drop every indexed course before ingesting
        #[arg(long)]
        clear: bool,
    },

    /// Ask a question about the indexed courses
    Ask {
        /// The question to ask
        question: String,

        /// Session id to read and extend conversation history
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Start an interactive chat session
    Chat,

    /// Search course content directly, without the language model
    Search {
        /// Search query
        query: String,

        /// Course name (partial names are resolved)
        #[arg(long)]
        course: Option<String>,

        /// Lesson number
        #[arg(short, long)]
        lesson: Option<u32>,
    },

    /// List indexed courses
    Courses,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Folder ingested at startup (defaults to documents.docs_dir)
        #[arg(long)]
        docs: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
