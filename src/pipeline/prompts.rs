//! Prompt templates loaded from the prompts row.

use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::sheets::RecordStore;

/// Placeholder for the cleaned website text.
pub const CONTENT: &str = "{{content}}";
/// Placeholder for the website summary.
pub const SUMMARY: &str = "{{summary}}";
/// Placeholder for the lead line.
pub const LINKEDIN: &str = "{{linkedin}}";
/// Placeholder for the drafted email.
pub const EMAIL: &str = "{{email}}";

/// The four templates driving a record's completion chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptTemplates {
    /// Summarize website content (`{{content}}`).
    pub summarize: String,
    /// Assess lead quality from a summary (`{{summary}}`).
    pub qualify: String,
    /// Draft an email (`{{summary}}`, `{{linkedin}}`).
    pub draft_email: String,
    /// Draft a subject line (`{{email}}`).
    pub draft_subject: String,
}

impl PromptTemplates {
    /// Read templates from columns A to D of the prompts row.
    ///
    /// # Errors
    /// Returns `MissingTemplate` if any of the four cells is blank or absent.
    pub fn from_row(row: &[String]) -> PipelineResult<Self> {
        let template = |index: usize, name: &'static str| {
            row.get(index)
                .filter(|value| !value.trim().is_empty())
                .cloned()
                .ok_or(PipelineError::MissingTemplate(name))
        };
        Ok(Self {
            summarize: template(0, "summarize")?,
            qualify: template(1, "qualify")?,
            draft_email: template(2, "draft_email")?,
            draft_subject: template(3, "draft_subject")?,
        })
    }

    /// Load templates from `range` of the spreadsheet.
    ///
    /// # Errors
    /// Returns an error if the read fails or a template is missing.
    pub async fn load(store: &dyn RecordStore, sheet_id: &str, range: &str) -> PipelineResult<Self> {
        let rows = store.read_range(sheet_id, range).await?;
        let templates = Self::from_row(rows.first().map_or(&[][..], Vec::as_slice))?;
        info!(range, "Loaded prompt templates");
        Ok(templates)
    }

    /// Summarize prompt for `content`.
    #[must_use]
    pub fn render_summarize(&self, content: &str) -> String {
        self.summarize.replacen(CONTENT, content, 1)
    }

    /// Quality prompt for `summary`.
    #[must_use]
    pub fn render_qualify(&self, summary: &str) -> String {
        self.qualify.replacen(SUMMARY, summary, 1)
    }

    /// Email prompt for `summary` and the lead line.
    #[must_use]
    pub fn render_draft_email(&self, summary: &str, lead_line: &str) -> String {
        self.draft_email
            .replacen(SUMMARY, summary, 1)
            .replacen(LINKEDIN, lead_line, 1)
    }

    /// Subject prompt for `email`.
    #[must_use]
    pub fn render_draft_subject(&self, email: &str) -> String {
        self.draft_subject.replacen(EMAIL, email, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::InMemoryRecordStore;

    fn templates() -> PromptTemplates {
        PromptTemplates {
            summarize: "Summarize: {{content}}".into(),
            qualify: "Rate: {{summary}}".into(),
            draft_email: "Write to {{linkedin}} about {{summary}}".into(),
            draft_subject: "Title for {{email}}".into(),
        }
    }

    #[test]
    fn test_render_each_stage() {
        let t = templates();
        assert_eq!(t.render_summarize("page"), "Summarize: page");
        assert_eq!(t.render_qualify("sum"), "Rate: sum");
        assert_eq!(
            t.render_draft_email("sum", "Alice Lee from Acme: N/A"),
            "Write to Alice Lee from Acme: N/A about sum"
        );
        assert_eq!(t.render_draft_subject("Hi"), "Title for Hi");
    }

    #[test]
    fn test_only_first_occurrence_is_replaced() {
        let t = PromptTemplates {
            summarize: "{{content}} / {{content}}".into(),
            ..templates()
        };
        assert_eq!(t.render_summarize("x"), "x / {{content}}");
    }

    #[test]
    fn test_email_substitutes_summary_before_lead_line() {
        let t = templates();
        assert_eq!(
            t.render_draft_email("notes on {{linkedin}}", "Bob Ray from Beta: N/A"),
            "Write to Bob Ray from Beta: N/A about notes on {{linkedin}}"
        );
    }

    #[test]
    fn test_missing_template() {
        let row: Vec<String> = vec!["a".into(), "b".into(), " ".into(), "d".into()];
        assert!(matches!(
            PromptTemplates::from_row(&row),
            Err(PipelineError::MissingTemplate("draft_email"))
        ));
        assert!(matches!(
            PromptTemplates::from_row(&[]),
            Err(PipelineError::MissingTemplate("summarize"))
        ));
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let store = InMemoryRecordStore::new().with_range(
            "sheet",
            "Prompts!2:2",
            vec![vec!["s {{content}}".into(), "q".into(), "e".into(), "t".into()]],
        );
        let loaded = PromptTemplates::load(&store, "sheet", "Prompts!2:2").await;
        assert_eq!(loaded.ok().map(|t| t.summarize), Some("s {{content}}".to_string()));

        let empty = PromptTemplates::load(&store, "sheet", "Other!1:1").await;
        assert!(matches!(empty, Err(PipelineError::MissingTemplate(_))));
    }
}
