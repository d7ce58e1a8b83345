//! Question → keywords → arXiv search → criteria filter, with caching.

use super::arxiv::PaperSource;
use super::criteria::Criteria;
use super::keywords::KeywordExtractor;
use crate::cache::TtlCache;
use crate::error::Result;
use crate::paper::Paper;
use crate::pipeline::validate_question;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const MIN_PAPERS: usize = 3;
pub const MAX_PAPERS: usize = 49;

/// Requested paper count, clamped to the supported range.
pub fn clamp_max_papers(requested: usize) -> usize {
    requested.clamp(MIN_PAPERS, MAX_PAPERS)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub papers: Vec<Paper>,
    pub keywords: Vec<String>,
    /// Papers left after the criteria filter.
    pub total_results: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct DiscoveryService {
    keywords: Arc<dyn KeywordExtractor>,
    source: Arc<dyn PaperSource>,
    cache: TtlCache<DiscoveryResult>,
}

impl DiscoveryService {
    pub fn new(
        keywords: Arc<dyn KeywordExtractor>,
        source: Arc<dyn PaperSource>,
        cache: TtlCache<DiscoveryResult>,
    ) -> Self {
        Self {
            keywords,
            source,
            cache,
        }
    }

    pub async fn discover(
        &self,
        question: &str,
        criteria: &str,
        max_papers: usize,
    ) -> Result<DiscoveryResult> {
        let question = validate_question(question)?;
        let max_papers = clamp_max_papers(max_papers);

        let cache_key = format!("{question}:{criteria}:{max_papers}");
        if let Some(cached) = self.cache.get(&cache_key) {
            info!(papers = cached.papers.len(), "Using cached discovery result");
            return Ok(cached);
        }

        let keywords = self.keywords.extract(question).await;
        if keywords.is_empty() {
            return Ok(DiscoveryResult {
                error: Some(
                    "No keywords could be extracted from the research question".to_string(),
                ),
                ..DiscoveryResult::default()
            });
        }

        let found = self.source.search(&keywords, max_papers).await?;
        let searched = found.len();
        let papers = Criteria::parse(criteria).apply(found);
        info!(searched, kept = papers.len(), "Discovery finished");

        let result = DiscoveryResult {
            total_results: papers.len(),
            papers,
            keywords,
            error: None,
        };
        self.cache.set(cache_key, result.clone());
        Ok(result)
    }
}
