//! Fetching a record's website and turning it into prompt text.

pub mod error;
pub mod http;
pub mod text;

pub use error::{FetchError, FetchResult};
pub use http::HttpContentFetcher;
pub use text::{clean_text, extract_visible_text, normalize_address};

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by fetchers.
pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of the visible text behind a record's locator.
pub trait ContentFetcher: Send + Sync {
    /// Fetch `locator` and return its cleaned visible text.
    fn fetch_text(&self, locator: &str) -> FetchFuture<'_, FetchResult<String>>;
}
