//! Hypothesis generation from paper text.

use super::sections::parse_sections;
use super::{
    StageClient, StageFailure, StageOutcome, extract_json, field, string_field, string_list,
    truncate_chars,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

const SYSTEM_PROMPT: &str = "You are a research scientist. From the paper text, propose novel, testable hypotheses \
that advance the research question, and note knowledge gaps and research directions. \
Respond with a JSON object: {\"hypotheses\": [{\"hypothesis\": \"...\", \"rationale\": \"...\", \
\"supporting_evidence\": [\"...\"], \"potential_impact\": \"...\"}], \"knowledge_gaps\": [\"...\"], \
\"research_directions\": [\"...\"]}.";

const PLACEHOLDER_STATEMENT: &str = "Hypothesis generation unavailable for this paper";

/// One proposed hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub statement: String,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supporting_evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_impact: Option<String>,
    /// Marks the stand-in produced when generation failed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl Hypothesis {
    pub fn new(statement: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            rationale: rationale.into(),
            supporting_evidence: Vec::new(),
            potential_impact: None,
            placeholder: false,
        }
    }

    /// Stand-in reported when no hypothesis could be generated.
    pub fn placeholder(cause: &str) -> Self {
        Self {
            placeholder: true,
            ..Self::new(
                PLACEHOLDER_STATEMENT,
                format!(
                    "Hypothesis generation failed ({cause}). This is usually transient; \
                     rerun the analysis for this paper."
                ),
            )
        }
    }

    /// Whether an experiment can be designed for this hypothesis.
    pub fn is_usable(&self) -> bool {
        !self.placeholder && !self.statement.trim().is_empty()
    }

    /// Hypotheses are matched by exact statement text.
    pub fn same_statement(&self, other: &Hypothesis) -> bool {
        self.statement == other.statement
    }
}

/// Everything the generator proposes for one paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypothesisSet {
    pub hypotheses: Vec<Hypothesis>,
    pub knowledge_gaps: Vec<String>,
    pub research_directions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HypothesisSet {
    pub fn failed(cause: impl Into<String>) -> Self {
        let cause = cause.into();
        Self {
            hypotheses: vec![Hypothesis::placeholder(&cause)],
            knowledge_gaps: Vec::new(),
            research_directions: Vec::new(),
            error: Some(cause),
        }
    }

    pub fn usable(&self) -> impl Iterator<Item = &Hypothesis> {
        self.hypotheses.iter().filter(|h| h.is_usable())
    }
}

#[async_trait]
pub trait HypothesisGenerator: Send + Sync {
    async fn generate(&self, text: &str, question: &str) -> StageOutcome<HypothesisSet>;
}

pub struct LlmHypothesisGenerator {
    client: StageClient,
    max_chars: usize,
}

impl LlmHypothesisGenerator {
    pub fn new(client: StageClient, max_chars: usize) -> Self {
        Self { client, max_chars }
    }

    async fn try_generate(
        &self,
        text: &str,
        question: &str,
    ) -> Result<HypothesisSet, StageFailure> {
        let text = truncate_chars(text, self.max_chars);
        let prompt = format!("Research question: {question}\n\nPaper text:\n{text}");
        let reply = self.client.ask(SYSTEM_PROMPT, &prompt, true).await?;

        let set = match extract_json(&reply) {
            Some(json) => from_json(&json),
            None => from_sections(&reply),
        };
        if set.hypotheses.is_empty() {
            return Err(StageFailure::Unusable("no hypotheses in reply".into()));
        }
        Ok(set)
    }
}

fn from_json(json: &Value) -> HypothesisSet {
    let hypotheses = match field(json, &["hypotheses"]) {
        Some(Value::Array(items)) => items.iter().filter_map(hypothesis_from_json).collect(),
        _ => Vec::new(),
    };
    HypothesisSet {
        hypotheses,
        knowledge_gaps: string_list(json, &["knowledge_gaps", "gaps"]),
        research_directions: string_list(json, &["research_directions", "directions"]),
        error: None,
    }
}

fn hypothesis_from_json(item: &Value) -> Option<Hypothesis> {
    match item {
        Value::String(s) if !s.trim().is_empty() => Some(Hypothesis::new(s.trim(), "")),
        Value::Object(_) => {
            let statement = string_field(item, &["hypothesis", "statement", "title"])?;
            Some(Hypothesis {
                supporting_evidence: string_list(item, &["supporting_evidence", "evidence"]),
                potential_impact: string_field(item, &["potential_impact", "impact"]),
                ..Hypothesis::new(statement, string_field(item, &["rationale"]).unwrap_or_default())
            })
        }
        _ => None,
    }
}

fn from_sections(reply: &str) -> HypothesisSet {
    let parsed = parse_sections(reply);
    HypothesisSet {
        hypotheses: parsed
            .items_matching("hypothes")
            .into_iter()
            .map(|statement| Hypothesis::new(statement, ""))
            .collect(),
        knowledge_gaps: parsed.items_matching("gap"),
        research_directions: parsed.items_matching("direction"),
        error: None,
    }
}

#[async_trait]
impl HypothesisGenerator for LlmHypothesisGenerator {
    async fn generate(&self, text: &str, question: &str) -> StageOutcome<HypothesisSet> {
        match self.try_generate(text, question).await {
            Ok(set) => StageOutcome::Produced(set),
            Err(e) => {
                let cause = e.to_string();
                warn!(stage = "hypotheses", error = %cause, "Hypothesis generation degraded");
                StageOutcome::degraded(HypothesisSet::failed(cause.clone()), cause)
            }
        }
    }
}
