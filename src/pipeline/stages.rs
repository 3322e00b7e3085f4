//! Typed stages of a record's completion chain.
//!
//! summary -> quality assessment, summary + lead line -> email -> subject.

use tracing::info;

use crate::llm::{CompletionClient, CompletionResult};
use crate::pipeline::prompts::PromptTemplates;
use crate::pipeline::record::preview;

/// Summary of a record's website.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary(pub String);

/// Lead-quality assessment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualityAssessment(pub String);

/// Drafted email body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DraftedEmail(pub String);

/// Drafted subject line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectLine(pub String);

/// Runs the stages for one record against a completion client.
pub struct Stages<'a> {
    client: &'a CompletionClient,
    templates: &'a PromptTemplates,
    row: usize,
}

impl<'a> Stages<'a> {
    /// Stages for the record at sheet row `row`.
    #[must_use]
    pub const fn new(client: &'a CompletionClient, templates: &'a PromptTemplates, row: usize) -> Self {
        Self {
            client,
            templates,
            row,
        }
    }

    /// Summarize the cleaned website text.
    ///
    /// # Errors
    /// Returns the completion error.
    pub async fn summarize(&self, content: &str) -> CompletionResult<Summary> {
        let text = self.client.complete(self.templates.render_summarize(content)).await?;
        info!(row = self.row, response = %preview(&text), "Website summary");
        Ok(Summary(text))
    }

    /// Assess lead quality from the summary.
    ///
    /// # Errors
    /// Returns the completion error.
    pub async fn assess(&self, summary: &Summary) -> CompletionResult<QualityAssessment> {
        let text = self.client.complete(self.templates.render_qualify(&summary.0)).await?;
        info!(row = self.row, response = %preview(&text), "Lead quality");
        Ok(QualityAssessment(text))
    }

    /// Draft an email from the summary and the lead line.
    ///
    /// # Errors
    /// Returns the completion error.
    pub async fn draft_email(&self, summary: &Summary, lead_line: &str) -> CompletionResult<DraftedEmail> {
        let prompt = self.templates.render_draft_email(&summary.0, lead_line);
        let text = self.client.complete(prompt).await?;
        info!(row = self.row, response = %preview(&text), "Crafted email");
        Ok(DraftedEmail(text))
    }

    /// Draft a subject line for the email.
    ///
    /// # Errors
    /// Returns the completion error.
    pub async fn draft_subject(&self, email: &DraftedEmail) -> CompletionResult<SubjectLine> {
        let text = self.client.complete(self.templates.render_draft_subject(&email.0)).await?;
        info!(row = self.row, response = %preview(&text), "Crafted subject");
        Ok(SubjectLine(text))
    }
}
