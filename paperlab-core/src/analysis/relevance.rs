//! Abstract-level relevance filtering.

use super::{StageClient, StageFailure, StageOutcome, extract_json, field, string_field};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Default minimum confidence for a paper to count as relevant.
pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.7;

const SYSTEM_PROMPT: &str = "You screen academic papers for a literature review. \
Decide whether the paper abstract is relevant to the research question. \
Respond with a JSON object: {\"is_relevant\": true|false, \"confidence\": number between 0 and 1, \"reason\": \"one sentence\"}.";

/// One relevance judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceVerdict {
    pub is_relevant: bool,
    /// Model confidence, clamped to [0, 1].
    pub confidence: f64,
    pub reason: String,
}

impl RelevanceVerdict {
    /// Verdict used when the check itself failed: keep the paper.
    pub fn inclusive_fallback(cause: &str) -> Self {
        Self {
            is_relevant: true,
            confidence: 0.0,
            reason: format!("Relevance check failed ({cause}); paper kept for analysis"),
        }
    }
}

/// Judges a paper abstract against the research question.
#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    async fn classify(&self, abstract_text: &str, question: &str) -> StageOutcome<RelevanceVerdict>;
}

/// Relevance classifier backed by a completion provider.
pub struct LlmRelevanceClassifier {
    client: StageClient,
    threshold: f64,
}

impl LlmRelevanceClassifier {
    pub fn new(client: StageClient) -> Self {
        Self::with_threshold(client, DEFAULT_RELEVANCE_THRESHOLD)
    }

    pub fn with_threshold(client: StageClient, threshold: f64) -> Self {
        Self {
            client,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    async fn try_classify(
        &self,
        abstract_text: &str,
        question: &str,
    ) -> Result<RelevanceVerdict, StageFailure> {
        let prompt = format!("Research question: {question}\n\nPaper abstract:\n{abstract_text}");
        let reply = self.client.ask(SYSTEM_PROMPT, &prompt, true).await?;
        let json = extract_json(&reply)
            .ok_or_else(|| StageFailure::Unusable("relevance reply was not JSON".into()))?;
        self.parse_verdict(&json)
    }

    fn parse_verdict(&self, json: &Value) -> Result<RelevanceVerdict, StageFailure> {
        let said_relevant = field(json, &["is_relevant", "relevant"])
            .and_then(as_flag)
            .ok_or_else(|| StageFailure::Unusable("relevance reply missing is_relevant".into()))?;
        let confidence = field(json, &["confidence", "score"])
            .and_then(as_number)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let reason =
            string_field(json, &["reason", "rationale", "explanation"]).unwrap_or_default();

        Ok(RelevanceVerdict {
            is_relevant: said_relevant && confidence >= self.threshold,
            confidence,
            reason,
        })
    }
}

#[async_trait]
impl RelevanceClassifier for LlmRelevanceClassifier {
    async fn classify(
        &self,
        abstract_text: &str,
        question: &str,
    ) -> StageOutcome<RelevanceVerdict> {
        match self.try_classify(abstract_text, question).await {
            Ok(verdict) => {
                debug!(
                    relevant = verdict.is_relevant,
                    confidence = verdict.confidence,
                    "Relevance verdict"
                );
                StageOutcome::Produced(verdict)
            }
            Err(e) => {
                let cause = e.to_string();
                warn!(stage = "relevance", error = %cause, "Relevance check degraded");
                StageOutcome::degraded(RelevanceVerdict::inclusive_fallback(&cause), cause)
            }
        }
    }
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "relevant" => Some(true),
            "false" | "no" | "not relevant" | "irrelevant" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Finite confidence from a number or a numeric string ("0.8", "85%").
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok().map(|n| {
            if n > 1.0 { n / 100.0 } else { n }
        }),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use crate::config::RetryConfig;
    use crate::error::LlmError;
    use crate::providers::RateLimiter;
    use std::sync::Arc;

    fn classifier(provider: Arc<MockLlmProvider>) -> LlmRelevanceClassifier {
        let client = StageClient::new(
            provider,
            Arc::new(RateLimiter::unlimited()),
            RetryConfig::none(),
        );
        LlmRelevanceClassifier::new(client)
    }

    #[tokio::test]
    async fn test_relevant_above_threshold() {
        let provider = Arc::new(MockLlmProvider::with_response(
            r#"{"is_relevant": true, "confidence": 0.9, "reason": "on topic"}"#,
        ));
        let outcome = classifier(provider).classify("abstract", "question").await;
        assert!(!outcome.is_degraded());
        let verdict = outcome.into_value();
        assert!(verdict.is_relevant);
        assert_eq!(verdict.reason, "on topic");
    }

    #[tokio::test]
    async fn test_low_confidence_is_not_relevant() {
        let provider = Arc::new(MockLlmProvider::with_response(
            r#"{"is_relevant": true, "confidence": 0.69, "reason": "tangential"}"#,
        ));
        let verdict = classifier(provider).classify("a", "q").await.into_value();
        assert!(!verdict.is_relevant);
        assert!((verdict.confidence - 0.69).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let provider = Arc::new(MockLlmProvider::with_response(
            r#"{"is_relevant": "yes", "confidence": 0.7}"#,
        ));
        let verdict = classifier(provider).classify("a", "q").await.into_value();
        assert!(verdict.is_relevant);
    }

    #[tokio::test]
    async fn test_confidence_is_clamped() {
        let provider = Arc::new(MockLlmProvider::with_response(
            r#"{"is_relevant": true, "confidence": 3.5, "reason": "sure"}"#,
        ));
        let verdict = classifier(provider).classify("a", "q").await.into_value();
        assert_eq!(verdict.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_paper() {
        let provider = Arc::new(MockLlmProvider::failing(LlmError::AuthFailed {
            provider: "openai".into(),
        }));
        let outcome = classifier(provider).classify("a", "q").await;
        assert!(outcome.is_degraded());
        let verdict = outcome.into_value();
        assert!(verdict.is_relevant);
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.reason.contains("Authentication failed"));
    }

    #[tokio::test]
    async fn test_malformed_reply_keeps_paper() {
        let provider = Arc::new(MockLlmProvider::with_response("I think it is relevant."));
        let outcome = classifier(provider).classify("a", "q").await;
        assert!(outcome.is_degraded());
        assert!(outcome.value().is_relevant);
    }

    #[tokio::test]
    async fn test_prompt_carries_question_and_abstract() {
        let provider = Arc::new(MockLlmProvider::with_response(
            r#"{"is_relevant": false, "confidence": 0.95, "reason": "off topic"}"#,
        ));
        classifier(provider.clone())
            .classify("Deep sea vents", "How do tardigrades survive?")
            .await;
        let request = &provider.requests()[0];
        assert!(request.json_mode);
        assert!(request.user_text().contains("tardigrades"));
        assert!(request.user_text().contains("Deep sea vents"));
    }

    #[test]
    fn test_as_number_percent_string() {
        assert_eq!(as_number(&Value::String("85%".into())), Some(0.85));
    }

    #[test]
    fn test_as_number_rejects_non_finite() {
        assert_eq!(as_number(&Value::String("NaN".into())), None);
        assert_eq!(as_number(&Value::String("inf".into())), None);
    }

    #[tokio::test]
    async fn test_nan_confidence_is_zero_and_not_relevant() {
        let provider = Arc::new(MockLlmProvider::with_response(
            r#"{"is_relevant": true, "confidence": "NaN", "reason": "unsure"}"#,
        ));
        let verdict = classifier(provider).classify("a", "q").await.into_value();
        assert_eq!(verdict.confidence, 0.0);
        assert!(!verdict.is_relevant);
    }
}
