// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI backend for deterministic testing.
//!
//! `MockBackend` implements `AiBackend` with pre-configured responses,
//! enabling fast, CI-runnable tests without external API calls or
//! subprocesses.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pandabot_core::{AiBackend, ChatRequest, ChatResponse, PandabotError};
use tokio::sync::Mutex;

/// A mock AI backend that returns pre-configured responses.
///
/// Responses are popped from a FIFO queue. When the queue is empty, a
/// default "mock response" text is returned. Every request is recorded
/// for later inspection.
pub struct MockBackend {
    responses: Arc<Mutex<VecDeque<ChatResponse>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    calls: Arc<AtomicUsize>,
    structured: bool,
}

impl MockBackend {
    /// Creates a structured-tools mock with an empty response queue.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            structured: true,
        }
    }

    /// Creates a structured-tools mock pre-loaded with the given responses.
    pub fn with_responses(responses: Vec<ChatResponse>) -> Self {
        let mock = Self::new();
        *mock.responses.try_lock().expect("fresh mutex") = VecDeque::from(responses);
        mock
    }

    /// Switches the mock to the text-tagged variant.
    pub fn text_tagged(mut self) -> Self {
        self.structured = false;
        self
    }

    /// Appends a response to the queue.
    pub async fn push_response(&self, response: ChatResponse) {
        self.responses.lock().await.push_back(response);
    }

    /// Number of `chat` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// All requests received, in call order.
    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiBackend for MockBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, PandabotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request);
        let response = self
            .responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| ChatResponse::text("mock response"));
        Ok(response)
    }

    fn supports_structured_tools(&self) -> bool {
        self.structured
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pandabot_core::ChatMessage;

    #[tokio::test]
    async fn default_response_when_queue_empty() {
        let backend = MockBackend::new();
        let resp = backend
            .chat(ChatRequest::new("", vec![ChatMessage::user("hi")]))
            .await
            .unwrap();
        assert_eq!(resp.text, "mock response");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn queued_responses_returned_in_order() {
        let backend = MockBackend::with_responses(vec![
            ChatResponse::text("first"),
            ChatResponse::text("second"),
        ]);
        let req = || ChatRequest::new("", vec![ChatMessage::user("hi")]);
        assert_eq!(backend.chat(req()).await.unwrap().text, "first");
        assert_eq!(backend.chat(req()).await.unwrap().text, "second");
        assert_eq!(backend.chat(req()).await.unwrap().text, "mock response");
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let backend = MockBackend::new();
        backend
            .chat(ChatRequest::new("sys", vec![ChatMessage::user("question")]))
            .await
            .unwrap();
        let requests = backend.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system, "sys");
    }
}
