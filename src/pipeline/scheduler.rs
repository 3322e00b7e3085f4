//! Chunked scheduling with shrink-and-retry on failure.
//!
//! All records of a chunk run concurrently and the scheduler waits for every
//! one of them. When any failed, the chunk is re-run from the same start with
//! its size cut to the offset of the first failure (at least one). A size-one
//! chunk that fails is skipped so the run always moves forward.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::BatchConfig;
use crate::progress::{PipelineEvent, ProgressReporter, SilentReporter};
use crate::sheets::DATA_ROW_OFFSET;

/// What to do after a chunk has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextStep {
    /// Every record succeeded; continue at `start` with an unchanged size.
    Advance {
        /// Next chunk start.
        start: usize,
    },
    /// Re-run from the same start with a smaller size.
    Retry {
        /// Same chunk start.
        start: usize,
        /// Shrunk chunk size.
        size: usize,
    },
    /// A size-one chunk failed; move past the record.
    Skip {
        /// Index of the skipped record.
        index: usize,
        /// Next chunk start.
        start: usize,
    },
}

/// Decide the next step for the chunk at `start` with configured `size`.
///
/// `results` holds one success flag per record of the chunk, in record order.
#[must_use]
pub fn plan_next(start: usize, size: usize, results: &[bool]) -> NextStep {
    match results.iter().position(|ok| !ok) {
        None => NextStep::Advance {
            start: start + results.len(),
        },
        Some(_) if size <= 1 => NextStep::Skip {
            index: start,
            start: start + 1,
        },
        Some(first_failure) => NextStep::Retry {
            start,
            size: first_failure.max(1),
        },
    }
}

/// Counters of a scheduling pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Chunk executions, including retries.
    pub chunks_executed: usize,
    /// Records in chunks that completed without failure.
    pub succeeded: usize,
    /// Indices of records skipped after failing alone.
    pub skipped: Vec<usize>,
    /// Whether the pass stopped on cancellation.
    pub cancelled: bool,
    /// First index not yet settled.
    pub next_index: usize,
}

/// Runs records chunk by chunk, never with two chunks in flight.
#[derive(Clone)]
pub struct BatchScheduler {
    initial_chunk_size: usize,
    inter_chunk_delay: Duration,
    reporter: Arc<dyn ProgressReporter>,
}

impl BatchScheduler {
    /// Create a scheduler from the batch settings.
    #[must_use]
    pub fn new(config: &BatchConfig) -> Self {
        Self {
            initial_chunk_size: config.initial_chunk_size.max(1),
            inter_chunk_delay: config.inter_chunk_delay,
            reporter: Arc::new(SilentReporter),
        }
    }

    /// Send chunk events to `reporter`.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Process indices `0..total`; `process` returns whether a record succeeded.
    pub async fn run<F, Fut>(&self, total: usize, cancel: &CancellationToken, process: F) -> ScheduleReport
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut report = ScheduleReport::default();
        let mut start = 0;
        let mut size = self.initial_chunk_size;

        while start < total {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let end = (start + size).min(total);
            self.reporter.report(PipelineEvent::ChunkStarted {
                first_row: start + DATA_ROW_OFFSET,
                last_row: end - 1 + DATA_ROW_OFFSET,
            });
            debug!(chunk_start = start, chunk_size = size, "Running chunk");

            let chunk = join_all((start..end).map(&process));
            let results = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                results = chunk => results,
            };
            report.chunks_executed += 1;

            match plan_next(start, size, &results) {
                NextStep::Advance { start: next } => {
                    self.reporter.report(PipelineEvent::ChunkCompleted {
                        first_row: start + DATA_ROW_OFFSET,
                        last_row: end - 1 + DATA_ROW_OFFSET,
                    });
                    report.succeeded += next - start;
                    start = next;
                }
                NextStep::Retry { start: same, size: shrunk } => {
                    let failed_rows = results
                        .iter()
                        .enumerate()
                        .filter(|(_, ok)| !**ok)
                        .map(|(offset, _)| start + offset + DATA_ROW_OFFSET)
                        .collect();
                    self.reporter.report(PipelineEvent::ChunkRetry {
                        failed_rows,
                        first_row: same + DATA_ROW_OFFSET,
                        last_row: (same + shrunk).min(total) - 1 + DATA_ROW_OFFSET,
                    });
                    size = shrunk;
                    continue;
                }
                NextStep::Skip { index, start: next } => {
                    debug!(row = index + DATA_ROW_OFFSET, "Skipping record after isolated failure");
                    self.reporter.report(PipelineEvent::RecordSkipped {
                        row: index + DATA_ROW_OFFSET,
                    });
                    report.skipped.push(index);
                    start = next;
                    continue;
                }
            }

            // Only a chunk with no failures is followed by the pause.
            if start < total && !self.inter_chunk_delay.is_zero() {
                debug!(delay = ?self.inter_chunk_delay, "Waiting before next chunk");
                tokio::select! {
                    () = cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                    () = tokio::time::sleep(self.inter_chunk_delay) => {}
                }
            }
        }

        report.next_index = start;
        report
    }
}
