//! Corpus-level consolidation of pipeline results.

use super::result::{DesignedExperiment, PipelineResult, PipelineStatus};
use crate::analysis::Hypothesis;
use crate::error::AggregationError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Consolidated view over one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub total_papers_processed: usize,
    pub successful_papers: usize,
    pub filtered_out: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub key_findings: Vec<String>,
    pub knowledge_gaps: Vec<String>,
    pub proposed_hypotheses: Vec<Hypothesis>,
    pub experimental_designs: Vec<DesignedExperiment>,
}

impl AggregatedReport {
    /// Designs whose hypothesis has exactly this statement.
    pub fn designs_for<'a>(
        &'a self,
        hypothesis: &'a Hypothesis,
    ) -> impl Iterator<Item = &'a DesignedExperiment> {
        self.experimental_designs
            .iter()
            .filter(move |d| d.hypothesis.same_statement(hypothesis))
    }
}

/// Order-preserving exact-match deduplication.
#[derive(Default)]
struct Dedup {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl Dedup {
    fn extend<'a>(&mut self, values: impl IntoIterator<Item = &'a String>) {
        for value in values {
            if self.seen.insert(value.clone()) {
                self.items.push(value.clone());
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate(
        &self,
        results: &[PipelineResult],
    ) -> Result<AggregatedReport, AggregationError> {
        let completed: Vec<_> = results.iter().filter_map(PipelineResult::analysis).collect();
        if completed.is_empty() {
            return Err(AggregationError::NothingToAggregate {
                total: results.len(),
            });
        }

        let count =
            |status: PipelineStatus| results.iter().filter(|r| r.status() == status).count();
        let mut findings = Dedup::default();
        let mut gaps = Dedup::default();
        let mut report = AggregatedReport {
            total_papers_processed: results.len(),
            successful_papers: completed.len(),
            filtered_out: count(PipelineStatus::FilteredOut),
            timed_out: count(PipelineStatus::Timeout),
            failed: count(PipelineStatus::Error),
            ..AggregatedReport::default()
        };

        for analysis in completed {
            findings.extend(&analysis.content.key_points);
            gaps.extend(&analysis.hypotheses.knowledge_gaps);
            report
                .proposed_hypotheses
                .extend(analysis.hypotheses.usable().cloned());
            report
                .experimental_designs
                .extend(analysis.experiments.iter().cloned());
        }
        report.key_findings = findings.items;
        report.knowledge_gaps = gaps.items;

        tracing::debug!(
            successful = report.successful_papers,
            findings = report.key_findings.len(),
            hypotheses = report.proposed_hypotheses.len(),
            "Aggregated pipeline results"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ContentAnalysis, ExperimentalDesign, HypothesisSet, RelevanceVerdict};
    use crate::paper::Paper;
    use crate::pipeline::result::{PaperAnalysis, PipelineOutcome};
    use pretty_assertions::assert_eq;

    fn completed(id: &str, points: &[&str], gaps: &[&str], hypotheses: &[&str]) -> PipelineResult {
        let hypotheses: Vec<Hypothesis> =
            hypotheses.iter().map(|h| Hypothesis::new(*h, "r")).collect();
        let experiments = hypotheses
            .iter()
            .map(|h| DesignedExperiment {
                hypothesis: h.clone(),
                design: ExperimentalDesign::default(),
            })
            .collect();
        PipelineResult::completed(
            PaperAnalysis {
                paper: Paper::new(id, "T", "A"),
                relevance: RelevanceVerdict {
                    is_relevant: true,
                    confidence: 0.8,
                    reason: String::new(),
                },
                content: ContentAnalysis {
                    summary: "S".into(),
                    key_points: points.iter().map(|s| s.to_string()).collect(),
                    limitations: Vec::new(),
                    error: None,
                },
                hypotheses: HypothesisSet {
                    hypotheses,
                    knowledge_gaps: gaps.iter().map(|s| s.to_string()).collect(),
                    research_directions: Vec::new(),
                    error: None,
                },
                experiments,
                degraded_stages: Vec::new(),
            },
            10,
        )
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let err = ResultAggregator::new().aggregate(&[]).unwrap_err();
        assert_eq!(err, AggregationError::NothingToAggregate { total: 0 });
    }

    #[test]
    fn test_no_completed_is_an_error() {
        let results = vec![
            PipelineResult::filtered_out("a", "off", 1),
            PipelineResult::timeout("b", "slow", 1),
        ];
        let err = ResultAggregator::new().aggregate(&results).unwrap_err();
        assert_eq!(err, AggregationError::NothingToAggregate { total: 2 });
    }

    #[test]
    fn test_findings_and_gaps_deduplicated_in_order() {
        let results = vec![
            completed("a", &["X", "Y"], &["G1"], &["H1"]),
            completed("b", &["Z", "X"], &["G1", "G2"], &["H2"]),
        ];
        let report = ResultAggregator::new().aggregate(&results).unwrap();
        assert_eq!(report.key_findings, vec!["X", "Y", "Z"]);
        assert_eq!(report.knowledge_gaps, vec!["G1", "G2"]);
        assert_eq!(report.proposed_hypotheses.len(), 2);
        assert_eq!(report.experimental_designs.len(), 2);
    }

    #[test]
    fn test_status_counts() {
        let results = vec![
            completed("a", &[], &[], &[]),
            PipelineResult::filtered_out("b", "off", 1),
            PipelineResult::error("c", "boom", 1),
            PipelineResult::timeout("d", "slow", 1),
        ];
        let report = ResultAggregator::new().aggregate(&results).unwrap();
        assert_eq!(report.total_papers_processed, 4);
        assert_eq!(report.successful_papers, 1);
        assert_eq!(report.filtered_out, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.timed_out, 1);
    }

    #[test]
    fn test_completed_but_empty_gives_empty_lists() {
        let report = ResultAggregator::new()
            .aggregate(&[completed("a", &[], &[], &[])])
            .unwrap();
        assert!(report.key_findings.is_empty());
        assert!(report.knowledge_gaps.is_empty());
        assert!(report.proposed_hypotheses.is_empty());
        assert!(report.experimental_designs.is_empty());
    }

    #[test]
    fn test_placeholders_are_not_proposed() {
        let mut result = completed("a", &[], &[], &[]);
        if let PipelineOutcome::Completed(analysis) = &mut result.outcome {
            analysis.hypotheses = HypothesisSet::failed("down");
        }
        let report = ResultAggregator::new().aggregate(&[result]).unwrap();
        assert!(report.proposed_hypotheses.is_empty());
    }

    #[test]
    fn test_designs_for_matches_statement() {
        let results = vec![completed("a", &[], &[], &["H1", "H2"])];
        let report = ResultAggregator::new().aggregate(&results).unwrap();
        let h2 = Hypothesis::new("H2", "other rationale");
        assert_eq!(report.designs_for(&h2).count(), 1);
    }
}
