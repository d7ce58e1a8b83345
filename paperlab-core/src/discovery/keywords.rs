//! Search keyword extraction from a research question.

use crate::analysis::{StageClient, extract_json, string_list};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, warn};

pub const DEFAULT_MAX_KEYWORDS: usize = 7;

const SYSTEM_PROMPT: &str = "You are a research expert. Extract the most relevant keywords from the given research \
question: only specific technical or scientific terms useful for searching academic papers, 5-7 at most. \
Respond with a JSON object: {\"keywords\": [\"...\"]}.";

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "between", "both", "but", "by",
    "can", "could", "did", "do", "does", "doing", "during", "each", "effect", "effects", "few",
    "for", "from", "further", "had", "has", "have", "having", "how", "if", "in", "into", "is", "it",
    "its", "more", "most", "no", "nor", "not", "of", "on", "once", "only", "or", "other", "our",
    "out", "over", "own", "same", "should", "so", "some", "such", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "through", "to", "under", "until",
    "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "would", "you", "your",
];

#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    /// At most the configured number of keywords; never fails.
    async fn extract(&self, question: &str) -> Vec<String>;
}

/// Keywords without a model: lower-cased content words in question order.
pub fn fallback_keywords(question: &str, max_keywords: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    question
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(|token| token.trim_matches('-').to_lowercase())
        .filter(|token| token.chars().count() > 2 && !STOP_WORDS.contains(&token.as_str()))
        .filter(|token| seen.insert(token.clone()))
        .take(max_keywords)
        .collect()
}

pub struct LlmKeywordExtractor {
    client: StageClient,
    max_keywords: usize,
}

impl LlmKeywordExtractor {
    pub fn new(client: StageClient, max_keywords: usize) -> Self {
        Self {
            client,
            max_keywords: max_keywords.max(1),
        }
    }
}

#[async_trait]
impl KeywordExtractor for LlmKeywordExtractor {
    async fn extract(&self, question: &str) -> Vec<String> {
        let keywords = match self.client.ask(SYSTEM_PROMPT, question, true).await {
            Ok(reply) => extract_json(&reply)
                .map(|json| string_list(&json, &["keywords"]))
                .unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Keyword extraction failed; using fallback");
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        let keywords: Vec<String> = keywords
            .into_iter()
            .filter(|k| seen.insert(k.to_lowercase()))
            .take(self.max_keywords)
            .collect();
        if keywords.is_empty() {
            let fallback = fallback_keywords(question, self.max_keywords);
            debug!(keywords = ?fallback, "Fallback keywords");
            return fallback;
        }
        debug!(keywords = ?keywords, "Extracted keywords");
        keywords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use crate::config::RetryConfig;
    use crate::error::LlmError;
    use crate::providers::RateLimiter;
    use std::sync::Arc;

    fn extractor(provider: Arc<MockLlmProvider>) -> LlmKeywordExtractor {
        let client = StageClient::new(
            provider,
            Arc::new(RateLimiter::unlimited()),
            RetryConfig::none(),
        );
        LlmKeywordExtractor::new(client, DEFAULT_MAX_KEYWORDS)
    }

    #[test]
    fn test_fallback_drops_stop_words() {
        let keywords = fallback_keywords(
            "What are the effects of sleep deprivation on memory consolidation?",
            7,
        );
        assert_eq!(keywords, vec!["sleep", "deprivation", "memory", "consolidation"]);
    }

    #[test]
    fn test_fallback_dedups_and_caps() {
        let keywords = fallback_keywords(
            "alpha beta gamma alpha delta epsilon zeta eta theta iota kappa",
            7,
        );
        assert_eq!(keywords.len(), 7);
        assert_eq!(keywords[0], "alpha");
        assert_eq!(keywords.iter().filter(|k| *k == "alpha").count(), 1);
    }

    #[test]
    fn test_fallback_keeps_hyphenated_terms() {
        let keywords = fallback_keywords("double-blind trials of CRISPR", 7);
        assert_eq!(keywords, vec!["double-blind", "trials", "crispr"]);
    }

    #[tokio::test]
    async fn test_model_keywords_are_capped() {
        let provider = Arc::new(MockLlmProvider::with_response(
            r#"{"keywords": ["a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "A1"]}"#,
        ));
        let keywords = extractor(provider).extract("q").await;
        assert_eq!(keywords.len(), 7);
        assert_eq!(keywords[6], "a7");
    }

    #[tokio::test]
    async fn test_provider_failure_uses_fallback() {
        let provider = Arc::new(MockLlmProvider::failing(LlmError::AuthFailed {
            provider: "openai".into(),
        }));
        let keywords = extractor(provider).extract("graphene thermal conductivity").await;
        assert_eq!(keywords, vec!["graphene", "thermal", "conductivity"]);
    }

    #[tokio::test]
    async fn test_empty_model_output_uses_fallback() {
        let provider = Arc::new(MockLlmProvider::with_response(r#"{"keywords": []}"#));
        let keywords = extractor(provider).extract("quantum dots").await;
        assert_eq!(keywords, vec!["quantum", "dots"]);
    }
}
