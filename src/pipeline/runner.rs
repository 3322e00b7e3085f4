//! One pipeline run: load prompts, read records once, schedule them.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::budget::TokenBudgeter;
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::fetch::{ContentFetcher, HttpContentFetcher};
use crate::llm::CompletionClient;
use crate::pipeline::processor::{ItemProcessor, ProcessingOutcome};
use crate::pipeline::prompts::PromptTemplates;
use crate::pipeline::record::Record;
use crate::pipeline::scheduler::BatchScheduler;
use crate::progress::{PipelineEvent, ProgressReporter, RunSummary};
use crate::sheets::{DATA_ROW_OFFSET, GoogleSheetsStore, RecordStore};

/// External collaborators of a run.
#[derive(Clone)]
pub struct PipelineBackends {
    /// Record and prompt storage.
    pub store: Arc<dyn RecordStore>,
    /// Website fetcher.
    pub fetcher: Arc<dyn ContentFetcher>,
    /// Completion client.
    pub client: CompletionClient,
}

impl PipelineBackends {
    /// Build the production backends: Google Sheets, HTTP fetching, chat completions.
    ///
    /// # Errors
    /// Returns an error if credentials cannot be resolved or a client cannot be built.
    pub async fn connect(config: &PipelineConfig) -> PipelineResult<Self> {
        let store = GoogleSheetsStore::connect(&config.sheet).await?;
        let fetcher = HttpContentFetcher::new(&config.fetch)?;
        let client = CompletionClient::from_config(&config.completion, TokenBudgeter::new()?)?;
        Ok(Self {
            store: Arc::new(store),
            fetcher: Arc::new(fetcher),
            client,
        })
    }
}

/// A record and whether it has been processed successfully in this run.
struct Slot {
    record: Record,
    done: bool,
}

/// Run the pipeline once over every record of the data range.
///
/// A failure before scheduling starts (prompt or record read) aborts the run
/// and is reported once as `RunFailed`.
///
/// # Errors
/// Returns the error that aborted the run.
pub async fn run_pipeline(
    config: &PipelineConfig,
    backends: PipelineBackends,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
) -> PipelineResult<RunSummary> {
    match execute(config, backends, Arc::clone(&reporter), &cancel).await {
        Ok(summary) => {
            if summary.cancelled {
                reporter.report(PipelineEvent::RunCancelled(summary.clone()));
            } else {
                reporter.report(PipelineEvent::RunFinished(summary.clone()));
            }
            Ok(summary)
        }
        Err(err) => {
            reporter.report(PipelineEvent::RunFailed {
                error: err.to_string(),
            });
            Err(err)
        }
    }
}

async fn execute(
    config: &PipelineConfig,
    backends: PipelineBackends,
    reporter: Arc<dyn ProgressReporter>,
    cancel: &CancellationToken,
) -> PipelineResult<RunSummary> {
    let sheet = &config.sheet;
    let templates =
        PromptTemplates::load(backends.store.as_ref(), &sheet.spreadsheet_id, &sheet.prompts_range)
            .await?;

    let range = sheet.qualified_data_range();
    let rows = backends.store.read_range(&sheet.spreadsheet_id, &range).await?;
    info!(range = %range, rows = rows.len(), "Read records");

    let slots: Vec<Mutex<Slot>> = rows
        .iter()
        .map(|row| {
            Mutex::new(Slot {
                record: Record::from_row(row),
                done: false,
            })
        })
        .collect();
    reporter.report(PipelineEvent::RunStarted { total: slots.len() });

    let processor = ItemProcessor::new(
        backends.store,
        backends.fetcher,
        backends.client.with_reporter(Arc::clone(&reporter)),
        Arc::new(templates),
        sheet.spreadsheet_id.clone(),
        sheet.sheet_name.clone(),
    );
    let scheduler = BatchScheduler::new(&config.batch).with_reporter(Arc::clone(&reporter));

    let report = scheduler
        .run(slots.len(), cancel, |index| {
            let processor = &processor;
            let slots = &slots;
            let reporter = &reporter;
            async move {
                let Some(slot) = slots.get(index) else {
                    return false;
                };
                let mut slot = slot.lock().await;
                if slot.done {
                    debug!(row = index + DATA_ROW_OFFSET, "Already processed in this run");
                    return true;
                }
                match processor.process(index, &slot.record).await {
                    ProcessingOutcome::Succeeded(written) => {
                        slot.record.apply(&written);
                        slot.done = true;
                        true
                    }
                    ProcessingOutcome::Failed(err) => {
                        reporter.report(PipelineEvent::RecordFailed {
                            row: index + DATA_ROW_OFFSET,
                            error: err.to_string(),
                        });
                        false
                    }
                }
            }
        })
        .await;

    Ok(RunSummary {
        total_records: slots.len(),
        chunks_executed: report.chunks_executed,
        skipped_records: report.skipped.len(),
        cancelled: report.cancelled,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use regex::Regex;
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    use super::*;
    use crate::budget::PromptBudget;
    use crate::llm::{CompletionError, CompletionTransport, RetryPolicy};
    use crate::pipeline::record::columns;
    use crate::progress::{ChannelReporter, SilentReporter};
    use crate::sheets::{CellAddress, InMemoryRecordStore};
    use crate::testing::{FnTransport, StaticFetcher};

    const SHEET: &str = "sheet-1";

    fn config() -> PipelineConfig {
        PipelineConfig::new()
            .with_spreadsheet_id(SHEET)
            .with_chunk_size(20)
            .with_chunk_delay(Duration::ZERO)
    }

    fn prompts_row() -> Vec<Vec<String>> {
        vec![vec![
            "Summarize {{content}}".into(),
            "Qualify {{summary}}".into(),
            "Email {{summary}} for {{linkedin}}".into(),
            "Subject {{email}}".into(),
        ]]
    }

    fn record_row(first: &str, last: &str, company: &str, website: &str) -> Vec<String> {
        let mut row = vec![String::new(); 15];
        row[0] = first.into();
        row[1] = last.into();
        row[2] = company.into();
        row[3] = website.into();
        row
    }

    /// Replies with the stage word followed by every record tag (`site7`,
    /// `P7`) found in the prompt, so each output names the record it came from.
    fn client() -> CompletionClient {
        let tags = Regex::new(r"\b(site\d+|P\d+)\b").unwrap_or_else(|err| panic!("{err}"));
        let transport: Arc<dyn CompletionTransport> =
            Arc::new(FnTransport::new(move |prompt: &str| -> Result<String, CompletionError> {
                let mut reply = vec![prompt.split_whitespace().next().unwrap_or_default()];
                for tag in tags.find_iter(prompt).map(|m| m.as_str()) {
                    if !reply.contains(&tag) {
                        reply.push(tag);
                    }
                }
                Ok(reply.join(" "))
            }));
        let budgeter = TokenBudgeter::new().unwrap_or_else(|err| panic!("{err}"));
        CompletionClient::new(
            transport,
            budgeter,
            PromptBudget::new(128_000, 30_000),
            RetryPolicy::unbounded(),
        )
        .unwrap_or_else(|err| panic!("{err}"))
    }

    fn backends(store: &Arc<InMemoryRecordStore>, fetcher: &Arc<StaticFetcher>) -> PipelineBackends {
        PipelineBackends {
            store: Arc::clone(store) as Arc<dyn RecordStore>,
            fetcher: Arc::clone(fetcher) as Arc<dyn ContentFetcher>,
            client: client(),
        }
    }

    fn seeded(rows: Vec<Vec<String>>) -> Arc<InMemoryRecordStore> {
        Arc::new(
            InMemoryRecordStore::new()
                .with_range(SHEET, "Prompts!2:2", prompts_row())
                .with_range(SHEET, "Responses!A2:O", rows),
        )
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_single_record_end_to_end() {
        let store = seeded(vec![record_row("Alice", "Lee", "Acme", "acme.com")]);
        let fetcher = Arc::new(StaticFetcher::new().with_page("acme.com", "Acme makes anvils"));

        let summary = run_pipeline(
            &config(),
            backends(&store, &fetcher),
            Arc::new(SilentReporter),
            CancellationToken::new(),
        )
        .await;

        let summary = summary.unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(summary.total_records, 1);
        assert_eq!(summary.skipped_records, 0);
        assert!(!summary.cancelled);

        let written = store.written_cells();
        assert_eq!(written.len(), 3);
        for column in [columns::QUALITY, columns::EMAIL, columns::SUBJECT] {
            let address = CellAddress::for_record("Responses", column, 0);
            let value = store.cell(SHEET, &address).unwrap_or_default();
            assert!(!value.is_empty(), "{address} is empty");
        }
    }

    #[tokio::test]
    async fn test_concurrent_chunk_writes_land_on_their_rows() {
        let rows: Vec<Vec<String>> = (0..20)
            .map(|i| record_row(&format!("P{i}"), "X", "Co", &format!("site{i}.com")))
            .collect();
        let store = seeded(rows);
        let fetcher = Arc::new(StaticFetcher::new());

        let summary = run_pipeline(
            &config(),
            backends(&store, &fetcher),
            Arc::new(SilentReporter),
            CancellationToken::new(),
        )
        .await;
        assert!(summary.is_ok_and(|s| s.chunks_executed == 1));
        assert_eq!(store.write_count(), 60);

        for i in 0..20 {
            let cell = |column| store.cell(SHEET, &CellAddress::for_record("Responses", column, i));
            assert_eq!(cell(columns::QUALITY), Some(format!("Qualify site{i}")), "row {i}");
            assert_eq!(cell(columns::EMAIL), Some(format!("Email site{i} P{i}")), "row {i}");
            assert_eq!(cell(columns::SUBJECT), Some(format!("Subject site{i} P{i}")), "row {i}");
        }
    }

    #[tokio::test]
    async fn test_succeeded_records_are_not_redone_on_retry() {
        let store = seeded(vec![
            record_row("Alice", "Lee", "Acme", "acme.com"),
            record_row("Bob", "Ray", "Beta", "beta.com"),
        ]);
        let fetcher = Arc::new(StaticFetcher::new().with_failure("beta.com"));
        let (tx, mut rx) = unbounded_channel();

        let summary = run_pipeline(
            &config(),
            backends(&store, &fetcher),
            Arc::new(ChannelReporter::new(tx)),
            CancellationToken::new(),
        )
        .await
        .unwrap_or_else(|err| panic!("{err}"));

        // Chunk of two, retry of record 0 alone (already done), record 1 alone.
        assert_eq!(summary.chunks_executed, 3);
        assert_eq!(summary.skipped_records, 1);
        assert_eq!(fetcher.calls(), 3);
        assert_eq!(store.write_count(), 3);

        let lines = drain(&mut rx);
        assert!(lines.iter().any(|l| l.starts_with("Error processing row 3:")));
        assert!(lines.iter().any(|l| l.starts_with("Row 3 failed on its own")));
        assert!(lines.last().is_some_and(|l| l.starts_with("Finished processing all chunks")));
    }

    #[tokio::test]
    async fn test_read_failure_aborts_run() {
        let store = seeded(Vec::new());
        store.fail_reads();
        let fetcher = Arc::new(StaticFetcher::new());
        let (tx, mut rx) = unbounded_channel();

        let result = run_pipeline(
            &config(),
            backends(&store, &fetcher),
            Arc::new(ChannelReporter::new(tx)),
            CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
        let lines = drain(&mut rx);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Run failed:"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_cancellation() {
        let store = seeded(vec![record_row("Alice", "Lee", "Acme", "acme.com")]);
        let fetcher = Arc::new(StaticFetcher::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = run_pipeline(&config(), backends(&store, &fetcher), Arc::new(SilentReporter), cancel)
            .await
            .unwrap_or_else(|err| panic!("{err}"));
        assert!(summary.cancelled);
        assert_eq!(store.write_count(), 0);
    }
}
