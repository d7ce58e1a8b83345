//! Per-paper analysis pipeline, its concurrent scheduler and the aggregator.
//!
//! `PipelineScheduler::run` and `ResultAggregator::aggregate` are the two
//! entry points used by the CLI and the HTTP API.

pub mod aggregate;
pub mod result;
pub mod runner;
pub mod scheduler;
pub mod state;

pub use aggregate::{AggregatedReport, ResultAggregator};
pub use result::{
    DesignedExperiment, PaperAnalysis, PipelineOutcome, PipelineResult, PipelineStatus, Stage,
};
pub use runner::PaperPipeline;
pub use scheduler::{PipelineScheduler, validate_question};
pub use state::PipelineState;
