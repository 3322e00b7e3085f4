//! Fetching source pages over HTTP.

use futures::StreamExt;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;
use url::Url;

use crate::config::FetchConfig;
use crate::fetch::error::{FetchError, FetchResult};
use crate::fetch::text::{extract_visible_text, normalize_address};
use crate::fetch::{ContentFetcher, FetchFuture};

/// Fetcher backed by a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct HttpContentFetcher {
    client: reqwest::Client,
    max_content_length: usize,
}

impl HttpContentFetcher {
    /// Create a fetcher from the fetch settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &FetchConfig) -> FetchResult<Self> {
        Ok(Self {
            client: build_client(config)?,
            max_content_length: config.max_content_length,
        })
    }

    async fn fetch(&self, locator: String) -> FetchResult<String> {
        let url = Url::parse(&normalize_address(&locator))?;
        debug!(%url, "Fetching website content");

        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_content_length as u64 {
                return Err(FetchError::TooLarge(len));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        if !content_type.contains("text/html")
            && !content_type.contains("application/xhtml")
            && !content_type.contains("text/plain")
        {
            return Err(FetchError::UnsupportedContentType(content_type));
        }

        // Without a Content-Length the cap is enforced while reading.
        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            let received = body.len() + chunk.len();
            if received > self.max_content_length {
                return Err(FetchError::TooLarge(received as u64));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(extract_visible_text(&String::from_utf8_lossy(&body)))
    }
}

impl ContentFetcher for HttpContentFetcher {
    fn fetch_text(&self, locator: &str) -> FetchFuture<'_, FetchResult<String>> {
        let locator = locator.to_string();
        Box::pin(async move { self.fetch(locator).await })
    }
}

/// Build an HTTP client with browser-like headers and the configured timeouts.
fn build_client(config: &FetchConfig) -> FetchResult<reqwest::Client> {
    let mut headers = HeaderMap::new();

    let ua = config.random_user_agent();
    if let Ok(ua_value) = HeaderValue::from_str(&ua) {
        headers.insert(USER_AGENT, ua_value);
    }
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(|e| FetchError::HttpClient(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use axum::Router;
    use axum::body::{Body, Bytes};
    use axum::http::header::CONTENT_TYPE;
    use axum::response::{Html, IntoResponse};
    use axum::routing::get;
    use futures::stream;

    use super::*;

    async fn page() -> Html<&'static str> {
        Html("<html><body><h1>Acme</h1><p>We build anvils.</p></body></html>")
    }

    /// 64 KiB of HTML sent chunked, so no Content-Length is announced.
    async fn endless() -> impl IntoResponse {
        let chunks = stream::iter(
            (0..64).map(|_| Ok::<_, Infallible>(Bytes::from(vec![b'a'; 1024]))),
        );
        ([(CONTENT_TYPE, "text/html")], Body::from_stream(chunks))
    }

    async fn serve() -> String {
        let router = Router::new()
            .route("/page", get(page))
            .route("/endless", get(endless));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|err| panic!("{err}"));
        let addr = listener.local_addr().unwrap_or_else(|err| panic!("{err}"));
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    fn fetcher(max_content_length: usize) -> HttpContentFetcher {
        HttpContentFetcher::new(&FetchConfig {
            max_content_length,
            ..FetchConfig::default()
        })
        .unwrap_or_else(|err| panic!("{err}"))
    }

    #[test]
    fn test_build_from_defaults() {
        assert!(HttpContentFetcher::new(&FetchConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_unparseable_locator() {
        let fetcher = HttpContentFetcher::new(&FetchConfig::default())
            .unwrap_or_else(|err| panic!("{err}"));
        let result = fetcher.fetch_text("exa mple .com/ bad host").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_extracts_visible_text() {
        let base = serve().await;
        let text = fetcher(4096).fetch_text(&format!("{base}/page")).await;
        let text = text.unwrap_or_else(|err| panic!("{err}"));
        assert!(text.contains("Acme"));
        assert!(text.contains("We build anvils."));
    }

    #[tokio::test]
    async fn test_streamed_body_stops_at_cap() {
        let base = serve().await;
        let result = fetcher(4096).fetch_text(&format!("{base}/endless")).await;
        assert!(
            matches!(result, Err(FetchError::TooLarge(len)) if len > 4096),
            "{result:?}"
        );
    }
}
