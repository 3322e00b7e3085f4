//! Error types for the outreach pipeline.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::llm::CompletionError;
use crate::sheets::StoreError;

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A prompt template was missing from the prompts row.
    #[error("missing prompt template: {0}")]
    MissingTemplate(&'static str),

    /// Tokenizer could not be initialized.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Regex error.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Completion service failure.
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    /// Source content fetch or extraction failure.
    #[error("content fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Tabular store I/O failure.
    #[error("record store failed: {0}")]
    Store(#[from] StoreError),
}

/// Convenience result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
