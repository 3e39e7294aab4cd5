// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the chat backend's JSON and SSE payloads.

use ragstream_core::{ChatRequest, HistoryEntry};
use serde::{Deserialize, Serialize};

/// Request body shared by the single-shot and streaming chat endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload<'a> {
    pub project_id: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub conversation_history: &'a [HistoryEntry],
    pub persist_conversation: bool,
    pub use_rag_search: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_config_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_ids: Option<&'a [String]>,
}

impl<'a> From<&'a ChatRequest> for ChatPayload<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        let options = &request.options;
        let persist = options.persist_conversation;
        Self {
            project_id: &request.conversation_id,
            message: &request.text,
            conversation_history: &options.conversation_history,
            persist_conversation: persist,
            use_rag_search: options.use_rag_search,
            llm_config_id: options.llm_config_id.as_deref(),
            // Thread and category routing only matter to a persisted exchange.
            thread_id: options.thread_id.as_deref().filter(|_| persist),
            category_ids: Some(options.category_ids.as_slice())
                .filter(|ids| persist && !ids.is_empty()),
        }
    }
}

/// Data of a `chunk`/`message` SSE event.
#[derive(Debug, Default, Deserialize)]
pub struct SseChunk {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub chunk: Option<String>,
}

impl SseChunk {
    /// The fragment text, preferring a non-empty `content`.
    pub fn into_text(self) -> String {
        self.content
            .filter(|c| !c.is_empty())
            .or(self.chunk)
            .unwrap_or_default()
    }
}

/// Error body returned by the backend, either as JSON on a non-2xx
/// response or as the data of an `error` SSE event.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message
            .or(self.error)
            .filter(|m| !m.trim().is_empty())
    }
}
