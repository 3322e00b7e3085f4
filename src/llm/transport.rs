//! Transport seam for a single completion attempt.

use std::future::Future;
use std::pin::Pin;

use crate::llm::error::CompletionResult;

/// Boxed future type for transport operations.
pub type CompletionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One raw prompt submission, with no retry or budgeting.
pub trait CompletionTransport: Send + Sync {
    /// Submit `prompt` once and return the untrimmed text output.
    ///
    /// # Errors
    /// Returns `CompletionError::RateLimited` for rate-limit signals and
    /// another variant for every other failure.
    fn send(&self, prompt: String) -> CompletionFuture<'_, CompletionResult<String>>;
}
