//! Token accounting and prompt truncation.

pub mod tokens;

pub use tokens::{PromptBudget, TokenBudgeter};
