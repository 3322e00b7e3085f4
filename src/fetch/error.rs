//! Error types for content fetching.

use thiserror::Error;

/// Errors that can occur while fetching a record's source content.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// The locator is not a valid URL, even after normalization.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response is larger than the configured cap.
    #[error("Content too large: {0} bytes")]
    TooLarge(u64),

    /// Content type not supported.
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;
