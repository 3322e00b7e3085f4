//! Per-record processing: mode selection, the completion chain, write-back.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::fetch::ContentFetcher;
use crate::llm::CompletionClient;
use crate::pipeline::prompts::PromptTemplates;
use crate::pipeline::record::{ProcessingMode, Record, WrittenFields, columns};
use crate::pipeline::stages::Stages;
use crate::sheets::{CellAddress, Column, DATA_ROW_OFFSET, RecordStore};

/// Result of processing one record.
#[derive(Debug)]
pub enum ProcessingOutcome {
    /// The record was processed; the written cells are listed.
    Succeeded(WrittenFields),
    /// The record failed; sibling records are unaffected.
    Failed(PipelineError),
}

impl ProcessingOutcome {
    /// Check if processing succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Drives the completion chain for single records and writes the results.
#[derive(Clone)]
pub struct ItemProcessor {
    store: Arc<dyn RecordStore>,
    fetcher: Arc<dyn ContentFetcher>,
    client: CompletionClient,
    templates: Arc<PromptTemplates>,
    sheet_id: String,
    sheet_name: String,
}

impl ItemProcessor {
    /// Create a processor writing to `sheet_name` of spreadsheet `sheet_id`.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        fetcher: Arc<dyn ContentFetcher>,
        client: CompletionClient,
        templates: Arc<PromptTemplates>,
        sheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            client,
            templates,
            sheet_id: sheet_id.into(),
            sheet_name: sheet_name.into(),
        }
    }

    /// Process the record at zero-based `index`.
    pub async fn process(&self, index: usize, record: &Record) -> ProcessingOutcome {
        match self.run(index, record).await {
            Ok(written) => ProcessingOutcome::Succeeded(written),
            Err(err) => ProcessingOutcome::Failed(err),
        }
    }

    async fn run(&self, index: usize, record: &Record) -> PipelineResult<WrittenFields> {
        let row = index + DATA_ROW_OFFSET;
        let mode = record.state().mode();
        let Some(website) = record.website.as_deref() else {
            debug!(row, "No website, nothing to do");
            return Ok(WrittenFields::default());
        };

        match mode {
            ProcessingMode::Skip => {
                debug!(row, "Record already settled");
                Ok(WrittenFields::default())
            }
            ProcessingMode::FullEmail => {
                info!(row, mode = mode.as_str(), website, "Generating email");
                let stages = Stages::new(&self.client, &self.templates, row);
                let content = self.fetcher.fetch_text(website).await?;
                let summary = stages.summarize(&content).await?;
                let quality = stages.assess(&summary).await?;
                let email = stages.draft_email(&summary, &record.lead_line()).await?;
                let subject = stages.draft_subject(&email).await?;

                self.write(index, columns::QUALITY, &quality.0).await?;
                self.write(index, columns::EMAIL, &email.0).await?;
                self.write(index, columns::SUBJECT, &subject.0).await?;

                Ok(WrittenFields {
                    quality: Some(quality.0),
                    email: Some(email.0),
                    subject: Some(subject.0),
                })
            }
            ProcessingMode::QualityOnly => {
                info!(row, mode = mode.as_str(), website, "Generating lead quality");
                let stages = Stages::new(&self.client, &self.templates, row);
                let content = self.fetcher.fetch_text(website).await?;
                let summary = stages.summarize(&content).await?;
                let quality = stages.assess(&summary).await?;

                self.write(index, columns::QUALITY, &quality.0).await?;

                Ok(WrittenFields {
                    quality: Some(quality.0),
                    ..WrittenFields::default()
                })
            }
        }
    }

    async fn write(&self, index: usize, column: Column, value: &str) -> PipelineResult<()> {
        let address = CellAddress::for_record(self.sheet_name.as_str(), column, index);
        self.store.write_cell(&self.sheet_id, &address, value).await?;
        debug!(%address, "Updated cell");
        Ok(())
    }
}
