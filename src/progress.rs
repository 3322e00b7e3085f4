//! Run progress events and where they go.
//!
//! The scheduler and runner describe what they are doing as `PipelineEvent`s;
//! a `ProgressReporter` decides whether those end up in the tracing log, in a
//! streamed HTTP response, or nowhere.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Counters describing a finished (or cancelled) run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records read from the store.
    pub total_records: usize,
    /// Chunk executions, including retries.
    pub chunks_executed: usize,
    /// Records that were skipped after failing alone.
    pub skipped_records: usize,
    /// Whether the run stopped because it was cancelled.
    pub cancelled: bool,
}

/// Something that happened during a run.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineEvent {
    /// Records were read and scheduling is about to start.
    RunStarted {
        /// Number of records read.
        total: usize,
    },
    /// A chunk started running; rows are 1-based sheet rows.
    ChunkStarted {
        /// First sheet row of the chunk.
        first_row: usize,
        /// Last sheet row of the chunk.
        last_row: usize,
    },
    /// One record failed.
    RecordFailed {
        /// Sheet row of the record.
        row: usize,
        /// Rendered error.
        error: String,
    },
    /// A chunk had failures and is re-run with a smaller size.
    ChunkRetry {
        /// Sheet rows that failed, in record order.
        failed_rows: Vec<usize>,
        /// First sheet row of the retried chunk.
        first_row: usize,
        /// Last sheet row of the retried chunk.
        last_row: usize,
    },
    /// A record failed on its own and the run moved past it.
    RecordSkipped {
        /// Sheet row of the record.
        row: usize,
    },
    /// A chunk finished without failures.
    ChunkCompleted {
        /// First sheet row of the chunk.
        first_row: usize,
        /// Last sheet row of the chunk.
        last_row: usize,
    },
    /// A completion request is waiting out a rate limit.
    RateLimited {
        /// Wait before the retry.
        wait: Duration,
    },
    /// Every chunk has been processed.
    RunFinished(RunSummary),
    /// The run was cancelled before reaching the end.
    RunCancelled(RunSummary),
    /// The run could not start or aborted as a whole.
    RunFailed {
        /// Rendered error.
        error: String,
    },
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunStarted { total } => write!(f, "Read {total} records"),
            Self::ChunkStarted {
                first_row,
                last_row,
            } => write!(f, "Processing rows {first_row} to {last_row}"),
            Self::RecordFailed { row, error } => write!(f, "Error processing row {row}: {error}"),
            Self::ChunkRetry {
                failed_rows,
                first_row,
                last_row,
            } => {
                let rows: Vec<String> = failed_rows.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "Errors occurred in rows: {}. Reprocessing rows {first_row} to {last_row}",
                    rows.join(", ")
                )
            }
            Self::RecordSkipped { row } => write!(f, "Row {row} failed on its own, moving on"),
            Self::ChunkCompleted {
                first_row,
                last_row,
            } => write!(f, "Processed rows {first_row} to {last_row}"),
            Self::RateLimited { wait } => write!(
                f,
                "Rate limit exceeded. Waiting for {:.3} seconds before retrying",
                wait.as_secs_f64()
            ),
            Self::RunFinished(summary) => write!(
                f,
                "Finished processing all chunks ({} records, {} chunk runs, {} skipped)",
                summary.total_records, summary.chunks_executed, summary.skipped_records
            ),
            Self::RunCancelled(summary) => write!(
                f,
                "Run cancelled after {} chunk runs",
                summary.chunks_executed
            ),
            Self::RunFailed { error } => write!(f, "Run failed: {error}"),
        }
    }
}

/// Receiver of run progress.
pub trait ProgressReporter: Send + Sync {
    /// Handle one event.
    fn report(&self, event: PipelineEvent);
}

/// Reporter that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn report(&self, _event: PipelineEvent) {}
}

/// Reporter that writes events to the tracing log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: PipelineEvent) {
        match &event {
            PipelineEvent::RecordFailed { .. }
            | PipelineEvent::ChunkRetry { .. }
            | PipelineEvent::RecordSkipped { .. }
            | PipelineEvent::RunFailed { .. } => warn!("{event}"),
            // Already logged by the completion client with its structured fields.
            PipelineEvent::RateLimited { .. } => debug!("{event}"),
            _ => info!("{event}"),
        }
    }
}

/// Reporter that forwards rendered events, one line each, into a channel.
#[derive(Clone, Debug)]
pub struct ChannelReporter {
    sender: UnboundedSender<String>,
}

impl ChannelReporter {
    /// Create a reporter feeding `sender`.
    #[must_use]
    pub const fn new(sender: UnboundedSender<String>) -> Self {
        Self { sender }
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, event: PipelineEvent) {
        TracingReporter.report(event.clone());
        // The receiving side may have gone away; the run carries on regardless.
        let _ = self.sender.send(format!("{event}\n"));
    }
}
