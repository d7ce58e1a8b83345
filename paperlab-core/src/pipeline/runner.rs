//! Sequential per-paper pipeline.

use super::result::{DesignedExperiment, PaperAnalysis, PipelineResult, Stage};
use super::state::PipelineState;
use crate::analysis::{
    ContentAnalyzer, ExperimentDesigner, HypothesisGenerator, LlmContentAnalyzer,
    LlmExperimentDesigner, LlmHypothesisGenerator, LlmRelevanceClassifier, RelevanceClassifier,
    StageClient, StageOutcome,
};
use crate::brain::LlmProvider;
use crate::config::PaperLabConfig;
use crate::error::PipelineError;
use crate::paper::Paper;
use crate::providers::RateLimiter;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span};

/// What `PaperPipeline::execute` ends with.
enum Finish {
    FilteredOut(String),
    Completed(PaperAnalysis),
}

/// Runs relevance → content → hypotheses → designs for one paper.
///
/// Stage failures degrade; only an orchestration fault yields an `error` result.
pub struct PaperPipeline {
    relevance: Arc<dyn RelevanceClassifier>,
    content: Arc<dyn ContentAnalyzer>,
    hypotheses: Arc<dyn HypothesisGenerator>,
    designer: Arc<dyn ExperimentDesigner>,
}

impl PaperPipeline {
    pub fn new(
        relevance: Arc<dyn RelevanceClassifier>,
        content: Arc<dyn ContentAnalyzer>,
        hypotheses: Arc<dyn HypothesisGenerator>,
        designer: Arc<dyn ExperimentDesigner>,
    ) -> Self {
        Self {
            relevance,
            content,
            hypotheses,
            designer,
        }
    }

    /// Wire the LLM-backed stages.
    ///
    /// Relevance and content analysis share the analysis provider and its
    /// limiter; hypotheses and designs share the science provider and its own.
    pub fn from_providers(
        config: &PaperLabConfig,
        analysis: Arc<dyn LlmProvider>,
        science: Arc<dyn LlmProvider>,
    ) -> Self {
        let interval = config.pipeline.llm_min_interval();
        let max_chars = config.pipeline.max_input_chars;
        let analysis_client = StageClient::new(
            analysis,
            Arc::new(RateLimiter::new(interval)),
            config.retry.clone(),
        );
        let science_client = StageClient::new(
            science,
            Arc::new(RateLimiter::new(interval)),
            config.retry.clone(),
        );

        Self::new(
            Arc::new(LlmRelevanceClassifier::with_threshold(
                analysis_client.clone(),
                config.pipeline.relevance_threshold,
            )),
            Arc::new(LlmContentAnalyzer::new(analysis_client, max_chars)),
            Arc::new(LlmHypothesisGenerator::new(science_client.clone(), max_chars)),
            Arc::new(LlmExperimentDesigner::new(science_client, max_chars)),
        )
    }

    /// Run every stage for `paper`; always returns exactly one result.
    pub async fn run(&self, paper: &Paper, question: &str) -> PipelineResult {
        let start = Instant::now();
        let span = info_span!("pipeline", paper_id = %paper.id);
        let finish = self.execute(paper, question).instrument(span).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match finish {
            Ok(Finish::FilteredOut(reason)) => {
                PipelineResult::filtered_out(&paper.id, reason, duration_ms)
            }
            Ok(Finish::Completed(analysis)) => PipelineResult::completed(analysis, duration_ms),
            Err(e) => PipelineResult::error(&paper.id, e.to_string(), duration_ms),
        };
        info!(
            paper_id = %paper.id,
            status = %result.status(),
            elapsed_ms = duration_ms,
            "Pipeline finished"
        );
        result
    }

    async fn execute(&self, paper: &Paper, question: &str) -> Result<Finish, PipelineError> {
        let mut state = PipelineState::Started;
        let mut degraded = Vec::new();

        let relevance = self.relevance.classify(&paper.abstract_text, question).await;
        note_degraded(&relevance, Stage::Relevance, &mut degraded);
        let relevance = relevance.into_value();
        state = state.transition(PipelineState::RelevanceChecked)?;

        if !relevance.is_relevant {
            state.transition(PipelineState::FilteredOut)?;
            debug!(reason = %relevance.reason, "Paper filtered out");
            return Ok(Finish::FilteredOut(relevance.reason));
        }

        let text = paper.text_for_analysis();
        debug!(
            full_text = paper.usable_full_text().is_some(),
            chars = text.chars().count(),
            "Analyzing paper text"
        );

        let content = self.content.analyze(text, question).await;
        note_degraded(&content, Stage::Content, &mut degraded);
        state = state.transition(PipelineState::ContentAnalyzed)?;

        let hypotheses = self.hypotheses.generate(text, question).await;
        note_degraded(&hypotheses, Stage::Hypotheses, &mut degraded);
        let hypotheses = hypotheses.into_value();
        state = state.transition(PipelineState::HypothesesGenerated)?;

        let mut experiments = Vec::new();
        let mut design_degraded = false;
        for hypothesis in hypotheses.usable() {
            let design = self.designer.design(hypothesis, text).await;
            design_degraded |= design.is_degraded();
            experiments.push(DesignedExperiment {
                hypothesis: hypothesis.clone(),
                design: design.into_value(),
            });
        }
        if design_degraded {
            degraded.push(Stage::Design);
        }
        state = state.transition(PipelineState::DesignsGenerated)?;
        state.transition(PipelineState::Completed)?;

        let mut metadata = paper.clone();
        metadata.full_text = None;
        Ok(Finish::Completed(PaperAnalysis {
            paper: metadata,
            relevance,
            content: content.into_value(),
            hypotheses,
            experiments,
            degraded_stages: degraded,
        }))
    }
}

fn note_degraded<T>(outcome: &StageOutcome<T>, stage: Stage, degraded: &mut Vec<Stage>) {
    if outcome.is_degraded() {
        degraded.push(stage);
    }
}
