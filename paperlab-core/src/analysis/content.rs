//! Structured summary of a paper's content.

use super::sections::parse_sections;
use super::{
    StageClient, StageFailure, StageOutcome, extract_json, string_field, string_list,
    truncate_chars,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub const ANALYSIS_FAILED_SUMMARY: &str = "Error analyzing paper content";

const SYSTEM_PROMPT: &str = "You are a research analyst. Read the paper text and relate it to the research question. \
Respond with a JSON object: {\"summary\": \"short paragraph\", \"relevant_points\": [\"finding\", ...], \"limitations\": [\"limitation\", ...]}.";

/// Summary, key points and limitations of one paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub summary: String,
    pub key_points: Vec<String>,
    pub limitations: Vec<String>,
    /// Set when the analysis failed and the fields above are placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContentAnalysis {
    pub fn failed(cause: impl Into<String>) -> Self {
        Self {
            summary: ANALYSIS_FAILED_SUMMARY.to_string(),
            key_points: Vec::new(),
            limitations: Vec::new(),
            error: Some(cause.into()),
        }
    }
}

#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str, question: &str) -> StageOutcome<ContentAnalysis>;
}

pub struct LlmContentAnalyzer {
    client: StageClient,
    max_chars: usize,
}

impl LlmContentAnalyzer {
    pub fn new(client: StageClient, max_chars: usize) -> Self {
        Self { client, max_chars }
    }

    async fn try_analyze(
        &self,
        text: &str,
        question: &str,
    ) -> Result<ContentAnalysis, StageFailure> {
        let text = truncate_chars(text, self.max_chars);
        let prompt = format!("Research question: {question}\n\nPaper text:\n{text}");
        let reply = self.client.ask(SYSTEM_PROMPT, &prompt, true).await?;

        let analysis = match extract_json(&reply) {
            Some(json) => from_json(&json),
            None => from_sections(&reply),
        };
        if analysis.summary.is_empty() && analysis.key_points.is_empty() {
            return Err(StageFailure::Unusable(
                "content analysis reply had no summary or findings".into(),
            ));
        }
        Ok(analysis)
    }
}

fn from_json(json: &Value) -> ContentAnalysis {
    ContentAnalysis {
        summary: string_field(json, &["summary"]).unwrap_or_default(),
        key_points: string_list(json, &["relevant_points", "key_points", "findings"]),
        limitations: string_list(json, &["limitations"]),
        error: None,
    }
}

fn from_sections(reply: &str) -> ContentAnalysis {
    let parsed = parse_sections(reply);
    ContentAnalysis {
        summary: parsed.items_matching_any(&["summary", "body"]).join(" "),
        key_points: parsed.items_matching_any(&["point", "finding"]),
        limitations: parsed.items_matching("limitation"),
        error: None,
    }
}

#[async_trait]
impl ContentAnalyzer for LlmContentAnalyzer {
    async fn analyze(&self, text: &str, question: &str) -> StageOutcome<ContentAnalysis> {
        match self.try_analyze(text, question).await {
            Ok(analysis) => StageOutcome::Produced(analysis),
            Err(e) => {
                let cause = e.to_string();
                warn!(stage = "content", error = %cause, "Content analysis degraded");
                StageOutcome::degraded(ContentAnalysis::failed(cause.clone()), cause)
            }
        }
    }
}
