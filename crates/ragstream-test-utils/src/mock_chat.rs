// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock single-shot chat transport.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ragstream_core::{ChatRequest, ChatResponse, ChatTransport, DeliveryError};
use tokio::sync::Mutex;

/// A [`ChatTransport`] returning pre-configured replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty a
/// "mock response" answer is returned.
#[derive(Default)]
pub struct MockChatTransport {
    replies: Arc<Mutex<VecDeque<Result<ChatResponse, DeliveryError>>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    latency: Option<Duration>,
}

impl MockChatTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-loads plain answers.
    pub fn with_answers(answers: &[&str]) -> Self {
        let replies = answers.iter().map(|a| Ok(answer(a))).collect();
        Self {
            replies: Arc::new(Mutex::new(replies)),
            ..Self::default()
        }
    }

    /// Pre-loads one failing reply.
    pub fn failing(err: DeliveryError) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from([Err(err)]))),
            ..Self::default()
        }
    }

    /// Delays every reply by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn push_reply(&self, reply: Result<ChatResponse, DeliveryError>) {
        self.replies.lock().await.push_back(reply);
    }

    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

/// A reply carrying only an answer.
pub fn answer(text: &str) -> ChatResponse {
    ChatResponse {
        answer: Some(text.to_string()),
        ..ChatResponse::default()
    }
}

#[async_trait]
impl ChatTransport for MockChatTransport {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, DeliveryError> {
        self.requests.lock().await.push(request.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(answer("mock response")))
    }
}
