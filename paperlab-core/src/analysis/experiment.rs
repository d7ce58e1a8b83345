//! Experimental design for a single hypothesis.

use super::hypothesis::Hypothesis;
use super::sections::parse_sections;
use super::{
    StageClient, StageFailure, StageOutcome, extract_json, field, string_field, string_list,
    truncate_chars,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub const DESIGN_UNAVAILABLE_OVERVIEW: &str = "Experimental design unavailable";

const SYSTEM_PROMPT: &str = "You are an experimental scientist. Design an experiment that tests the hypothesis, \
grounded in the paper context. Respond with a JSON object: {\"experimental_design\": {\"overview\": \"...\", \
\"procedures\": [\"...\"], \"methodologies\": [\"...\"], \"required_equipment\": [\"...\"], \"controls\": [\"...\"], \
\"potential_challenges\": [\"...\"], \"expected_outcomes\": [\"...\"]}}.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentalDesign {
    pub overview: String,
    pub procedures: Vec<String>,
    pub methodologies: Vec<String>,
    pub required_equipment: Vec<String>,
    pub controls: Vec<String>,
    pub potential_challenges: Vec<String>,
    pub expected_outcomes: Vec<String>,
}

impl ExperimentalDesign {
    /// Design reported when the designer failed; the cause is the only challenge listed.
    pub fn unavailable(cause: impl Into<String>) -> Self {
        Self {
            overview: DESIGN_UNAVAILABLE_OVERVIEW.to_string(),
            potential_challenges: vec![cause.into()],
            ..Self::default()
        }
    }

    fn is_blank(&self) -> bool {
        self.overview.is_empty() && self.procedures.is_empty() && self.methodologies.is_empty()
    }
}

#[async_trait]
pub trait ExperimentDesigner: Send + Sync {
    async fn design(
        &self,
        hypothesis: &Hypothesis,
        context: &str,
    ) -> StageOutcome<ExperimentalDesign>;
}

pub struct LlmExperimentDesigner {
    client: StageClient,
    max_chars: usize,
}

impl LlmExperimentDesigner {
    pub fn new(client: StageClient, max_chars: usize) -> Self {
        Self { client, max_chars }
    }

    async fn try_design(
        &self,
        hypothesis: &Hypothesis,
        context: &str,
    ) -> Result<ExperimentalDesign, StageFailure> {
        let context = truncate_chars(context, self.max_chars);
        let prompt = format!(
            "Hypothesis: {}\nRationale: {}\n\nPaper context:\n{context}",
            hypothesis.statement, hypothesis.rationale
        );
        let reply = self.client.ask(SYSTEM_PROMPT, &prompt, true).await?;

        let design = match extract_json(&reply) {
            Some(json) => {
                let inner = field(&json, &["experimental_design", "design"])
                    .filter(|v| v.is_object())
                    .unwrap_or(&json);
                from_json(inner)
            }
            None => from_sections(&reply),
        };
        if design.is_blank() {
            return Err(StageFailure::Unusable("design reply had no content".into()));
        }
        Ok(design)
    }
}

fn from_json(json: &Value) -> ExperimentalDesign {
    ExperimentalDesign {
        overview: string_field(json, &["overview", "summary"]).unwrap_or_default(),
        procedures: string_list(json, &["procedures", "procedure", "steps"]),
        methodologies: string_list(json, &["methodologies", "methodology", "methods"]),
        required_equipment: string_list(json, &["required_equipment", "equipment"]),
        controls: string_list(json, &["controls"]),
        potential_challenges: string_list(json, &["potential_challenges", "challenges"]),
        expected_outcomes: string_list(json, &["expected_outcomes", "outcomes"]),
    }
}

fn from_sections(reply: &str) -> ExperimentalDesign {
    let parsed = parse_sections(reply);
    ExperimentalDesign {
        overview: parsed.items_matching("overview").join(" "),
        procedures: parsed.items_matching("procedure"),
        methodologies: parsed.items_matching("method"),
        required_equipment: parsed.items_matching("equipment"),
        controls: parsed.items_matching("control"),
        potential_challenges: parsed.items_matching("challenge"),
        expected_outcomes: parsed.items_matching("outcome"),
    }
}

#[async_trait]
impl ExperimentDesigner for LlmExperimentDesigner {
    async fn design(
        &self,
        hypothesis: &Hypothesis,
        context: &str,
    ) -> StageOutcome<ExperimentalDesign> {
        match self.try_design(hypothesis, context).await {
            Ok(design) => StageOutcome::Produced(design),
            Err(e) => {
                let cause = e.to_string();
                warn!(stage = "design", error = %cause, "Experimental design degraded");
                StageOutcome::degraded(ExperimentalDesign::unavailable(cause.clone()), cause)
            }
        }
    }
}
