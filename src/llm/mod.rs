//! Completion service access.
//!
//! - `transport`: the seam for a single raw completion attempt
//! - `openai`: chat-completions transport over HTTP
//! - `rate_limit`: retry-after hint parsing and retry bounds
//! - `client`: budget enforcement plus wait-and-retry on rate limits

pub mod client;
pub mod error;
pub mod openai;
pub mod rate_limit;
pub mod transport;

pub use client::CompletionClient;
pub use error::{CompletionError, CompletionResult};
pub use openai::OpenAiTransport;
pub use rate_limit::{RetryHintParser, RetryPolicy};
pub use transport::{CompletionFuture, CompletionTransport};
