//! Token estimation and prefix truncation.
//!
//! Counts use the GPT-3 byte-pair encoding (`r50k_base`), which is what the
//! provider bills prompts against closely enough for budget enforcement.

use std::fmt;
use std::sync::Arc;

use tiktoken_rs::CoreBPE;
use tracing::warn;

use crate::error::{PipelineError, PipelineResult};

/// Ceiling and response headroom applied to every outgoing prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromptBudget {
    /// Prompts estimated above this many tokens are truncated.
    pub ceiling: usize,
    /// Tokens left free for the response once a prompt is truncated.
    pub reserve: usize,
}

impl PromptBudget {
    /// Create a budget.
    #[must_use]
    pub const fn new(ceiling: usize, reserve: usize) -> Self {
        Self { ceiling, reserve }
    }

    /// Token count an oversized prompt is cut down to.
    #[must_use]
    pub const fn truncation_target(&self) -> usize {
        self.ceiling.saturating_sub(self.reserve)
    }
}

/// Deterministic token counter and truncator.
#[derive(Clone)]
pub struct TokenBudgeter {
    bpe: Arc<CoreBPE>,
}

impl fmt::Debug for TokenBudgeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBudgeter").finish_non_exhaustive()
    }
}

impl TokenBudgeter {
    /// Load the encoder.
    ///
    /// # Errors
    /// Returns an error if the encoder tables cannot be loaded.
    pub fn new() -> PipelineResult<Self> {
        let bpe = tiktoken_rs::r50k_base().map_err(|err| {
            PipelineError::Tokenizer(format!("failed to load r50k_base encoder: {err}"))
        })?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    /// Estimate the token length of `text`.
    #[must_use]
    pub fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Return the longest token prefix of `text` that re-estimates to at most
    /// `max_tokens`. Text already within budget is returned unchanged.
    #[must_use]
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }

        let mut take = max_tokens;
        while take > 0 {
            // A cut inside a multi-byte character does not decode.
            match self.bpe.decode(tokens[..take].to_vec()) {
                Ok(prefix) => {
                    let count = self.estimate(&prefix);
                    if count <= max_tokens {
                        return prefix;
                    }
                    take = take.saturating_sub((count - max_tokens).max(1));
                }
                Err(_) => take -= 1,
            }
        }

        String::new()
    }

    /// Apply `budget` to a fully-substituted prompt.
    #[must_use]
    pub fn fit(&self, prompt: String, budget: PromptBudget) -> String {
        let count = self.estimate(&prompt);
        if count <= budget.ceiling {
            return prompt;
        }

        warn!(
            tokens = count,
            ceiling = budget.ceiling,
            target = budget.truncation_target(),
            "Prompt exceeds the token ceiling, truncating"
        );
        self.truncate(&prompt, budget.truncation_target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budgeter() -> TokenBudgeter {
        TokenBudgeter::new().unwrap_or_else(|err| panic!("encoder: {err}"))
    }

    #[test]
    fn test_estimate() {
        let budgeter = budgeter();
        assert_eq!(budgeter.estimate(""), 0);

        let short = budgeter.estimate("Hello, world!");
        assert!(short > 0 && short < 10);

        let long = budgeter.estimate("Hello, world! This sentence has quite a few more tokens.");
        assert!(long > short);
    }

    #[test]
    fn test_truncate_within_budget_is_identity() {
        let budgeter = budgeter();
        let text = "Acme builds rockets and sells them to coyotes.";
        let n = budgeter.estimate(text);
        assert_eq!(budgeter.truncate(text, n), text);
        assert_eq!(budgeter.truncate(text, n + 10), text);
    }

    #[test]
    fn test_truncate_respects_budget_and_is_prefix() {
        let budgeter = budgeter();
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        for max in [0, 1, 2, 7, 25, 100, 300] {
            let cut = budgeter.truncate(&text, max);
            assert!(budgeter.estimate(&cut) <= max, "max={max}");
            assert!(text.starts_with(&cut), "max={max}");
        }
    }

    #[test]
    fn test_truncate_zero_budget_is_empty() {
        let budgeter = budgeter();
        assert_eq!(budgeter.truncate("anything at all", 0), "");
    }

    #[test]
    fn test_truncate_multibyte_text() {
        let budgeter = budgeter();
        let text = "日本語のテキストと絵文字 🚀🚀🚀 が混ざっています。".repeat(10);
        for max in [1, 3, 5, 11, 40] {
            let cut = budgeter.truncate(&text, max);
            assert!(budgeter.estimate(&cut) <= max, "max={max}");
            assert!(text.starts_with(&cut), "max={max}");
        }
    }

    #[test]
    fn test_fit_truncates_to_ceiling_minus_reserve() {
        let budgeter = budgeter();
        let prompt = "word ".repeat(500);
        let budget = PromptBudget::new(100, 30);

        let fitted = budgeter.fit(prompt.clone(), budget);
        assert!(budgeter.estimate(&fitted) <= 70);
        assert!(prompt.starts_with(&fitted));

        let small = "short prompt".to_string();
        assert_eq!(budgeter.fit(small.clone(), budget), small);
    }
}
