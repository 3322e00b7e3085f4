//! Rate-limit wait hints and retry bounds.

use std::time::Duration;

use regex::Regex;

/// Extracts the wait duration from a provider rate-limit message
/// (`"... Please try again in 2.5s. ..."`).
#[derive(Clone, Debug)]
pub struct RetryHintParser {
    pattern: Regex,
}

impl RetryHintParser {
    /// Compile the hint pattern.
    ///
    /// # Errors
    /// Returns an error if the pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(r"try again in (\d+(?:\.\d+)?)(ms|s)")?,
        })
    }

    /// Parse the wait duration, or `None` when the message carries no usable hint.
    #[must_use]
    pub fn parse(&self, message: &str) -> Option<Duration> {
        let captures = self.pattern.captures(message)?;
        let value: f64 = captures.get(1)?.as_str().parse().ok()?;
        let secs = match captures.get(2)?.as_str() {
            "ms" => value / 1000.0,
            _ => value,
        };
        Duration::try_from_secs_f64(secs).ok()
    }
}

/// Upper bound on rate-limit retries for a single request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt; `None` never gives up.
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    /// Retry for as long as the provider keeps sending wait hints.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { max_retries: None }
    }

    /// Give up after `max_retries` waits.
    #[must_use]
    pub const fn bounded(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
        }
    }

    /// Whether another retry is allowed after `retries_so_far` waits.
    #[must_use]
    pub const fn allows(&self, retries_so_far: u32) -> bool {
        match self.max_retries {
            Some(max) => retries_so_far < max,
            None => true,
        }
    }
}
