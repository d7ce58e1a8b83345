//! Brain module: text-completion provider abstraction.
//!
//! Defines the `LlmProvider` trait every analysis stage talks to, and a
//! scriptable `MockLlmProvider` used throughout the test suites.

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Trait for text-completion providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;

    /// Whether calls can possibly succeed (credentials present, endpoint configured).
    fn is_available(&self) -> bool {
        true
    }
}

/// A mock provider for testing.
///
/// Responses (or errors) are queued and handed out in FIFO order. Every
/// request is captured so tests can assert on call counts and prompt content.
pub struct MockLlmProvider {
    model: String,
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Create a MockLlmProvider that always returns the given text.
    ///
    /// Queues multiple copies of the response so it can handle multiple calls.
    pub fn with_response(text: &str) -> Self {
        let provider = Self::new();
        for _ in 0..20 {
            provider.queue_text(text);
        }
        provider
    }

    /// Create a MockLlmProvider whose every call fails with `error`.
    pub fn failing(error: LlmError) -> Self {
        let provider = Self::new();
        for _ in 0..20 {
            provider.queue_error(error.clone());
        }
        provider
    }

    /// Sleep for `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(response));
    }

    /// Queue a plain text response.
    pub fn queue_text(&self, text: &str) {
        self.queue_response(Self::text_response(text));
    }

    /// Queue an error for the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(error));
    }

    /// Number of `complete` calls received so far.
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.unwrap_or_else(|| {
            Ok(MockLlmProvider::text_response(
                "I'm a mock LLM. No queued responses available.",
            ))
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_default_response() {
        let provider = MockLlmProvider::new();
        let response = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap();
        assert!(response.text().contains("mock LLM"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_queued_in_order() {
        let provider = MockLlmProvider::new();
        provider.queue_text("first");
        provider.queue_error(LlmError::EmptyResponse);
        provider.queue_text("third");

        let first = provider.complete(CompletionRequest::default()).await;
        assert_eq!(first.unwrap().text(), "first");
        let second = provider.complete(CompletionRequest::default()).await;
        assert!(matches!(second, Err(LlmError::EmptyResponse)));
        let third = provider.complete(CompletionRequest::default()).await;
        assert_eq!(third.unwrap().text(), "third");
    }

    #[tokio::test]
    async fn test_mock_provider_captures_requests() {
        let provider = MockLlmProvider::with_response("ok");
        let request = CompletionRequest::instructed("system", "the user turn");
        provider.complete(request).await.unwrap();

        let captured = provider.requests();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].user_text(), "the user turn");
    }

    #[tokio::test]
    async fn test_mock_provider_failing() {
        let provider = MockLlmProvider::failing(LlmError::Connection {
            message: "down".into(),
        });
        for _ in 0..3 {
            assert!(provider.complete(CompletionRequest::default()).await.is_err());
        }
        assert_eq!(provider.call_count(), 3);
    }
}
