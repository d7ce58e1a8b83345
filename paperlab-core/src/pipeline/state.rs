//! Per-paper pipeline states and their legal transitions.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Started,
    RelevanceChecked,
    FilteredOut,
    ContentAnalyzed,
    HypothesesGenerated,
    DesignsGenerated,
    Completed,
    Error,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::FilteredOut | PipelineState::Completed | PipelineState::Error
        )
    }

    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        if next == Error {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Started, RelevanceChecked)
                | (RelevanceChecked, FilteredOut)
                | (RelevanceChecked, ContentAnalyzed)
                | (ContentAnalyzed, HypothesesGenerated)
                | (HypothesesGenerated, DesignsGenerated)
                | (DesignsGenerated, Completed)
        )
    }

    /// Move to `next`, rejecting anything outside the transition table.
    pub fn transition(self, next: PipelineState) -> Result<PipelineState, PipelineError> {
        if self.can_transition_to(next) {
            tracing::trace!(from = %self, to = %next, "Pipeline transition");
            Ok(next)
        } else {
            Err(PipelineError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Started => "started",
            PipelineState::RelevanceChecked => "relevance_checked",
            PipelineState::FilteredOut => "filtered_out",
            PipelineState::ContentAnalyzed => "content_analyzed",
            PipelineState::HypothesesGenerated => "hypotheses_generated",
            PipelineState::DesignsGenerated => "designs_generated",
            PipelineState::Completed => "completed",
            PipelineState::Error => "error",
        };
        write!(f, "{name}")
    }
}
