//! Per-paper pipeline results.

use crate::analysis::{
    ContentAnalysis, ExperimentalDesign, Hypothesis, HypothesisSet, RelevanceVerdict,
};
use crate::paper::Paper;
use serde::{Deserialize, Serialize};

/// Final status of one paper's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Completed,
    FilteredOut,
    Timeout,
    Error,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStatus::Completed => write!(f, "completed"),
            PipelineStatus::FilteredOut => write!(f, "filtered_out"),
            PipelineStatus::Timeout => write!(f, "timeout"),
            PipelineStatus::Error => write!(f, "error"),
        }
    }
}

/// Analysis stages that can degrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Relevance,
    Content,
    Hypotheses,
    Design,
}

/// A design paired with the hypothesis it tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignedExperiment {
    pub hypothesis: Hypothesis,
    pub design: ExperimentalDesign,
}

/// Everything produced for a paper that made it through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperAnalysis {
    /// Paper metadata; the full text is not carried.
    pub paper: Paper,
    pub relevance: RelevanceVerdict,
    pub content: ContentAnalysis,
    pub hypotheses: HypothesisSet,
    pub experiments: Vec<DesignedExperiment>,
    /// Stages that fell back to their failure value, in execution order.
    #[serde(default)]
    pub degraded_stages: Vec<Stage>,
}

/// Status plus what goes with it: a payload on success, a reason otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Completed(Box<PaperAnalysis>),
    FilteredOut { reason: String },
    Timeout { reason: String },
    Error { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub paper_id: String,
    #[serde(flatten)]
    pub outcome: PipelineOutcome,
    pub duration_ms: u64,
}

impl PipelineResult {
    pub fn completed(analysis: PaperAnalysis, duration_ms: u64) -> Self {
        Self {
            paper_id: analysis.paper.id.clone(),
            outcome: PipelineOutcome::Completed(Box::new(analysis)),
            duration_ms,
        }
    }

    pub fn filtered_out(
        paper_id: impl Into<String>,
        reason: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            paper_id: paper_id.into(),
            outcome: PipelineOutcome::FilteredOut {
                reason: reason.into(),
            },
            duration_ms,
        }
    }

    pub fn timeout(
        paper_id: impl Into<String>,
        reason: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            paper_id: paper_id.into(),
            outcome: PipelineOutcome::Timeout {
                reason: reason.into(),
            },
            duration_ms,
        }
    }

    pub fn error(paper_id: impl Into<String>, reason: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            paper_id: paper_id.into(),
            outcome: PipelineOutcome::Error {
                reason: reason.into(),
            },
            duration_ms,
        }
    }

    pub fn status(&self) -> PipelineStatus {
        match self.outcome {
            PipelineOutcome::Completed(_) => PipelineStatus::Completed,
            PipelineOutcome::FilteredOut { .. } => PipelineStatus::FilteredOut,
            PipelineOutcome::Timeout { .. } => PipelineStatus::Timeout,
            PipelineOutcome::Error { .. } => PipelineStatus::Error,
        }
    }

    pub fn analysis(&self) -> Option<&PaperAnalysis> {
        match &self.outcome {
            PipelineOutcome::Completed(analysis) => Some(analysis),
            _ => None,
        }
    }

    /// Human-readable reason for a non-completed result.
    pub fn reason(&self) -> Option<&str> {
        match &self.outcome {
            PipelineOutcome::Completed(_) => None,
            PipelineOutcome::FilteredOut { reason }
            | PipelineOutcome::Timeout { reason }
            | PipelineOutcome::Error { reason } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> PaperAnalysis {
        PaperAnalysis {
            paper: Paper::new("2401.00001", "T", "A"),
            relevance: RelevanceVerdict {
                is_relevant: true,
                confidence: 0.9,
                reason: "fits".into(),
            },
            content: ContentAnalysis::failed("down"),
            hypotheses: HypothesisSet::default(),
            experiments: Vec::new(),
            degraded_stages: vec![Stage::Content],
        }
    }

    #[test]
    fn test_completed_carries_payload() {
        let result = PipelineResult::completed(analysis(), 12);
        assert_eq!(result.paper_id, "2401.00001");
        assert_eq!(result.status(), PipelineStatus::Completed);
        assert!(result.analysis().is_some());
        assert!(result.reason().is_none());
    }

    #[test]
    fn test_non_completed_carries_reason() {
        let result = PipelineResult::timeout("p", "took too long", 300_000);
        assert_eq!(result.status(), PipelineStatus::Timeout);
        assert!(result.analysis().is_none());
        assert_eq!(result.reason(), Some("took too long"));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(PipelineResult::filtered_out("p", "off topic", 5)).unwrap();
        assert_eq!(json["paper_id"], "p");
        assert_eq!(json["status"], "filtered_out");
        assert_eq!(json["reason"], "off topic");

        let json = serde_json::to_value(PipelineResult::completed(analysis(), 1)).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["degraded_stages"][0], "content");
        assert_eq!(json["relevance"]["confidence"], 0.9);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(PipelineStatus::FilteredOut.to_string(), "filtered_out");
    }
}
