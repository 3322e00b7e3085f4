//! In-crate fakes for the completion, fetch and store seams.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::fetch::{ContentFetcher, FetchError, FetchFuture, FetchResult};
use crate::llm::{CompletionError, CompletionFuture, CompletionResult, CompletionTransport};

/// Transport that replays a fixed script of responses in order.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<CompletionResult<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<CompletionResult<String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }
}

impl CompletionTransport for ScriptedTransport {
    fn send(&self, prompt: String) -> CompletionFuture<'_, CompletionResult<String>> {
        Box::pin(async move {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt);
            }
            self.script
                .lock()
                .ok()
                .and_then(|mut script| script.pop_front())
                .unwrap_or_else(|| Err(CompletionError::MalformedResponse("script exhausted".into())))
        })
    }
}

/// Transport answering each prompt with a function of it.
pub struct FnTransport<F> {
    respond: F,
    calls: AtomicUsize,
}

impl<F> FnTransport<F>
where
    F: Fn(&str) -> CompletionResult<String> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> CompletionTransport for FnTransport<F>
where
    F: Fn(&str) -> CompletionResult<String> + Send + Sync,
{
    fn send(&self, prompt: String) -> CompletionFuture<'_, CompletionResult<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.respond)(&prompt);
        Box::pin(async move {
            tokio::task::yield_now().await;
            result
        })
    }
}

/// Fetcher serving canned text per locator.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, locator: &str, text: &str) -> Self {
        self.pages.insert(locator.to_string(), text.to_string());
        self
    }

    pub fn with_failure(mut self, locator: &str) -> Self {
        self.failing.insert(locator.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentFetcher for StaticFetcher {
    fn fetch_text(&self, locator: &str) -> FetchFuture<'_, FetchResult<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.failing.contains(locator) {
            Err(FetchError::Status {
                url: locator.to_string(),
                status: 503,
            })
        } else {
            Ok(self
                .pages
                .get(locator)
                .cloned()
                .unwrap_or_else(|| format!("Welcome to {locator}")))
        };
        Box::pin(async move { result })
    }
}
