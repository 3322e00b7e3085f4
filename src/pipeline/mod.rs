//! The batch pipeline.
//!
//! - `record`: sheet schema, record state and processing mode
//! - `prompts`: the four prompt templates
//! - `stages`: typed completion stages
//! - `processor`: one record through its completion chain
//! - `scheduler`: chunked execution with shrink-and-retry
//! - `runner`: a whole run from prompt load to summary

pub mod processor;
pub mod prompts;
pub mod record;
pub mod runner;
pub mod scheduler;
pub mod stages;

pub use processor::{ItemProcessor, ProcessingOutcome};
pub use prompts::PromptTemplates;
pub use record::{ProcessingMode, Record, RecordState, WrittenFields};
pub use runner::{PipelineBackends, run_pipeline};
pub use scheduler::{BatchScheduler, NextStep, ScheduleReport, plan_next};
pub use stages::{DraftedEmail, QualityAssessment, Stages, SubjectLine, Summary};
