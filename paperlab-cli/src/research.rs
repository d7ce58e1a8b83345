//! Wiring of discovery, screening and the analysis pipeline for the CLI and
//! the HTTP API.

use futures::future::join_all;
use paperlab_core::analysis::{LlmRelevanceClassifier, RelevanceClassifier, RelevanceVerdict};
use paperlab_core::discovery::{
    ArxivClient, ArxivPdfFetcher, FullTextFetcher, LlmKeywordExtractor, hydrate_full_text,
};
use paperlab_core::error::ValidationError;
use paperlab_core::{
    AggregatedReport, DiscoveryResult, DiscoveryService, Paper, PaperLabConfig, PaperPipeline,
    PipelineResult, PipelineScheduler, RateLimiter, ResultAggregator, StageClient, TtlCache,
    create_provider,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// A paper that passed relevance screening, with the verdict that kept it.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenedPaper {
    #[serde(flatten)]
    pub paper: Paper,
    pub relevance: RelevanceVerdict,
}

/// Per-paper results plus the corpus report, when anything completed.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRun {
    pub results: Vec<PipelineResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AggregatedReport>,
    /// Why there is no report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_error: Option<String>,
}

pub struct ResearchApp {
    discovery: DiscoveryService,
    relevance: Arc<dyn RelevanceClassifier>,
    scheduler: PipelineScheduler,
    fulltext: Option<Arc<dyn FullTextFetcher>>,
}

impl ResearchApp {
    pub fn new(
        discovery: DiscoveryService,
        relevance: Arc<dyn RelevanceClassifier>,
        scheduler: PipelineScheduler,
        fulltext: Option<Arc<dyn FullTextFetcher>>,
    ) -> Self {
        Self {
            discovery,
            relevance,
            scheduler,
            fulltext,
        }
    }

    /// Build the production wiring: arXiv search, PDF full text and the two
    /// configured LLM providers.
    pub fn from_config(config: &PaperLabConfig) -> anyhow::Result<Self> {
        let analysis = create_provider(&config.analysis_llm);
        let science = create_provider(&config.science_llm);

        let screening = StageClient::new(
            analysis.clone(),
            Arc::new(RateLimiter::new(config.pipeline.llm_min_interval())),
            config.retry.clone(),
        );
        let keywords = LlmKeywordExtractor::new(screening.clone(), config.search.max_keywords);
        let relevance =
            LlmRelevanceClassifier::with_threshold(screening, config.pipeline.relevance_threshold);

        let discovery = DiscoveryService::new(
            Arc::new(keywords),
            Arc::new(ArxivClient::new(&config.search)?),
            TtlCache::from_config(&config.cache),
        );
        let pipeline = PaperPipeline::from_providers(config, analysis, science);
        let fulltext: Arc<dyn FullTextFetcher> = Arc::new(ArxivPdfFetcher::new(&config.search)?);

        Ok(Self::new(
            discovery,
            Arc::new(relevance),
            PipelineScheduler::new(Arc::new(pipeline), &config.pipeline),
            Some(fulltext),
        ))
    }

    pub async fn discover(
        &self,
        question: &str,
        criteria: &str,
        max_papers: usize,
    ) -> paperlab_core::Result<DiscoveryResult> {
        self.discovery.discover(question, criteria, max_papers).await
    }

    /// Keep the papers whose abstracts the classifier judges relevant.
    pub async fn screen(&self, question: &str, papers: Vec<Paper>) -> Vec<ScreenedPaper> {
        let verdicts = join_all(
            papers
                .iter()
                .map(|paper| self.relevance.classify(&paper.abstract_text, question)),
        )
        .await;

        let initial = papers.len();
        let kept: Vec<ScreenedPaper> = papers
            .into_iter()
            .zip(verdicts)
            .filter_map(|(paper, outcome)| {
                let relevance = outcome.into_value();
                relevance.is_relevant.then_some(ScreenedPaper { paper, relevance })
            })
            .collect();
        info!(initial, kept = kept.len(), "Screened abstracts");
        kept
    }

    /// Run the full pipeline over `papers` and aggregate what completed.
    pub async fn analyze(
        &self,
        question: &str,
        papers: Vec<Paper>,
        fetch_full_text: bool,
    ) -> Result<AnalysisRun, ValidationError> {
        let papers = match (&self.fulltext, fetch_full_text) {
            (Some(fetcher), true) => hydrate_full_text(fetcher.as_ref(), papers).await,
            _ => papers,
        };

        let results = self.scheduler.run(papers, question).await?;
        let (report, report_error) = match ResultAggregator::new().aggregate(&results) {
            Ok(report) => (Some(report), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Ok(AnalysisRun {
            results,
            report,
            report_error,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::offline_app;
    use super::*;

    #[tokio::test]
    async fn test_screen_keeps_relevant_papers() {
        let app = offline_app();
        let found = app.discover("Does sleep help memory?", "", 10).await.unwrap();
        assert_eq!(found.total_results, 2);

        let kept = app.screen("Does sleep help memory?", found.papers).await;
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].paper.id, "2401.00001");
        assert_eq!(kept[0].relevance.reason, "On topic");
    }

    #[tokio::test]
    async fn test_analyze_degrades_without_credentials() {
        let app = offline_app();
        let papers = vec![Paper::new("p1", "T", "Sleep improves recall")];
        let run = app.analyze("sleep?", papers, true).await.unwrap();
        assert_eq!(run.results.len(), 1);
        let report = run.report.unwrap();
        assert_eq!(report.successful_papers, 1);
        assert!(report.proposed_hypotheses.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_rejects_empty_batch() {
        let err = offline_app().analyze("sleep?", Vec::new(), false).await.unwrap_err();
        assert_eq!(err, ValidationError::NoPapers);
    }
}
