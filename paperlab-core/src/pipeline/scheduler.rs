//! Bounded concurrent execution of paper pipelines.
//!
//! Each paper gets a task that waits for a worker slot, then spawns the
//! pipeline as a separate worker and waits on it with the per-paper timeout.
//! The slot belongs to the waiting task, not the worker. On timeout the
//! worker is aborted and the slot is released, so a hung stage can never
//! starve the papers still queued.

use super::result::PipelineResult;
use super::runner::PaperPipeline;
use crate::config::{MAX_QUESTION_CHARS, PipelineConfig};
use crate::error::ValidationError;
use crate::paper::Paper;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Check a research question; returns it trimmed.
pub fn validate_question(question: &str) -> Result<&str, ValidationError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyQuestion);
    }
    let len = trimmed.chars().count();
    if len > MAX_QUESTION_CHARS {
        return Err(ValidationError::QuestionTooLong {
            len,
            max: MAX_QUESTION_CHARS,
        });
    }
    Ok(trimmed)
}

pub struct PipelineScheduler {
    pipeline: Arc<PaperPipeline>,
    max_workers: usize,
    task_timeout: Duration,
}

impl PipelineScheduler {
    pub fn new(pipeline: Arc<PaperPipeline>, config: &PipelineConfig) -> Self {
        Self::with_limits(pipeline, config.max_workers, config.task_timeout())
    }

    pub fn with_limits(
        pipeline: Arc<PaperPipeline>,
        max_workers: usize,
        task_timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            max_workers: max_workers.max(1),
            task_timeout,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run the pipeline over every paper.
    ///
    /// Returns one result per input paper, in completion order. Per-paper
    /// problems (timeouts, panics) become results; only caller misuse errors.
    pub async fn run(
        &self,
        papers: Vec<Paper>,
        question: &str,
    ) -> Result<Vec<PipelineResult>, ValidationError> {
        let question = validate_question(question)?;
        if papers.is_empty() {
            return Err(ValidationError::NoPapers);
        }

        let total = papers.len();
        let started = Instant::now();
        info!(
            papers = total,
            workers = self.max_workers,
            timeout_secs = self.task_timeout.as_secs(),
            "Starting pipeline batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let question: Arc<str> = Arc::from(question);
        let mut tasks = FuturesUnordered::new();

        for paper in papers {
            let paper_id = paper.id.clone();
            let handle = tokio::spawn(run_one(
                paper,
                question.clone(),
                self.pipeline.clone(),
                semaphore.clone(),
                self.task_timeout,
            ));
            tasks.push(async move { (paper_id, handle.await) });
        }

        let mut results = Vec::with_capacity(total);
        while let Some((paper_id, joined)) = tasks.next().await {
            let result = joined.unwrap_or_else(|e| {
                warn!(paper_id = %paper_id, error = %e, "Pipeline task aborted");
                PipelineResult::error(paper_id, format!("Pipeline task aborted: {e}"), 0)
            });
            results.push(result);
        }

        info!(
            papers = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline batch finished"
        );
        Ok(results)
    }
}

async fn run_one(
    paper: Paper,
    question: Arc<str>,
    pipeline: Arc<PaperPipeline>,
    semaphore: Arc<Semaphore>,
    task_timeout: Duration,
) -> PipelineResult {
    let paper_id = paper.id.clone();
    // Held until this function returns, whatever the worker does.
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return PipelineResult::error(paper_id, "Worker pool closed", 0);
    };

    // The timeout clock starts once a slot is held.
    let started = Instant::now();
    let mut worker = tokio::spawn(async move { pipeline.run(&paper, &question).await });

    match tokio::time::timeout(task_timeout, &mut worker).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            let elapsed = started.elapsed().as_millis() as u64;
            let reason = if e.is_panic() {
                "Pipeline panicked".to_string()
            } else {
                format!("Pipeline worker failed: {e}")
            };
            warn!(paper_id = %paper_id, error = %e, "Pipeline worker failed");
            PipelineResult::error(paper_id, reason, elapsed)
        }
        Err(_) => {
            worker.abort();
            let elapsed = started.elapsed().as_millis() as u64;
            warn!(
                paper_id = %paper_id,
                timeout_ms = task_timeout.as_millis() as u64,
                "Pipeline timed out; worker aborted"
            );
            PipelineResult::timeout(
                paper_id,
                format!("Processing exceeded the {:?} timeout", task_timeout),
                elapsed,
            )
        }
    }
}
