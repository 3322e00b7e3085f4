//! Budgeted, rate-limit-aware completion client.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::budget::{PromptBudget, TokenBudgeter};
use crate::config::CompletionConfig;
use crate::error::PipelineResult;
use crate::llm::error::{CompletionError, CompletionResult};
use crate::llm::openai::OpenAiTransport;
use crate::llm::rate_limit::{RetryHintParser, RetryPolicy};
use crate::llm::transport::CompletionTransport;
use crate::progress::{PipelineEvent, ProgressReporter, SilentReporter};

/// Completion client used by the item processor.
///
/// Each call truncates oversized prompts, then resubmits the identical prompt
/// after every rate-limit response that carries a wait hint. Every other error
/// is returned to the caller without retry.
#[derive(Clone)]
pub struct CompletionClient {
    transport: Arc<dyn CompletionTransport>,
    budgeter: TokenBudgeter,
    budget: PromptBudget,
    retry: RetryPolicy,
    hints: RetryHintParser,
    reporter: Arc<dyn ProgressReporter>,
}

impl CompletionClient {
    /// Create a client around an arbitrary transport.
    ///
    /// # Errors
    /// Returns an error if the retry-hint pattern cannot be compiled.
    pub fn new(
        transport: Arc<dyn CompletionTransport>,
        budgeter: TokenBudgeter,
        budget: PromptBudget,
        retry: RetryPolicy,
    ) -> PipelineResult<Self> {
        Ok(Self {
            transport,
            budgeter,
            budget,
            retry,
            hints: RetryHintParser::new()?,
            reporter: Arc::new(SilentReporter),
        })
    }

    /// Create a client for the configured chat-completions endpoint.
    ///
    /// # Errors
    /// Returns an error if the HTTP client or the retry-hint pattern cannot be built.
    pub fn from_config(config: &CompletionConfig, budgeter: TokenBudgeter) -> PipelineResult<Self> {
        let transport = Arc::new(OpenAiTransport::new(config)?);
        Self::new(
            transport,
            budgeter,
            PromptBudget::new(config.prompt_token_ceiling, config.response_token_reserve),
            RetryPolicy {
                max_retries: config.max_rate_limit_retries,
            },
        )
    }

    /// Report rate-limit waits to `reporter`.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Complete `prompt`, returning the trimmed response text.
    ///
    /// # Errors
    /// Returns the first non-rate-limit error, a rate-limit error whose message
    /// has no parseable wait, or `RetriesExhausted` once a configured ceiling is hit.
    pub async fn complete(&self, prompt: String) -> CompletionResult<String> {
        let prompt = self.budgeter.fit(prompt, self.budget);
        let mut retries = 0_u32;

        debug!(chars = prompt.len(), "Sending prompt to completion service");
        loop {
            match self.transport.send(prompt.clone()).await {
                Ok(text) => return Ok(text.trim().to_string()),
                Err(CompletionError::RateLimited { message }) => {
                    let Some(wait) = self.hints.parse(&message) else {
                        error!(%message, "Rate limit response carried no wait hint");
                        return Err(CompletionError::RateLimited { message });
                    };
                    if !self.retry.allows(retries) {
                        return Err(CompletionError::RetriesExhausted {
                            attempts: retries + 1,
                            message,
                        });
                    }
                    retries += 1;
                    warn!(
                        wait_secs = wait.as_secs_f64(),
                        retries, "Rate limit exceeded, waiting before retrying"
                    );
                    self.reporter.report(PipelineEvent::RateLimited { wait });
                    tokio::time::sleep(wait).await;
                }
                Err(err) => {
                    error!(%err, "Error communicating with completion service");
                    return Err(err);
                }
            }
        }
    }
}
