// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the delivery pipeline and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a message in the conversation view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no identifier has been assigned.
    pub fn is_missing(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        MessageId(value.to_string())
    }
}

/// Speaker of a conversational turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A supporting-context reference attached to an assistant message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDocument {
    #[serde(default, alias = "document_id")]
    pub document_id: Option<String>,
    #[serde(default, alias = "file_name")]
    pub file_name: Option<String>,
    #[serde(default, alias = "chunk_text")]
    pub chunk_text: Option<String>,
    #[serde(default)]
    pub similarity: Option<f64>,
    /// Any other fields the backend sends, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A conversational turn as rendered by the conversation view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub documents: Vec<ContextDocument>,
    #[serde(default)]
    pub similarity: Option<f64>,
    #[serde(default)]
    pub persisted_id: Option<String>,
    /// Set when the session producing this message failed unrecoverably.
    #[serde(default)]
    pub error: Option<String>,
}

impl Message {
    /// A finalized message with the given role and content.
    pub fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
            is_streaming: false,
            documents: Vec::new(),
            similarity: None,
            persisted_id: None,
            error: None,
        }
    }

    /// An empty assistant message that a session is about to fill.
    pub fn streaming_assistant(id: MessageId) -> Self {
        Self {
            is_streaming: true,
            ..Self::new(id, Role::Assistant, "")
        }
    }
}

/// One prior turn passed back to the remote service as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Options that accompany a chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOptions {
    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub persist_conversation: bool,
    #[serde(default = "default_use_rag_search")]
    pub use_rag_search: bool,
    #[serde(default)]
    pub llm_config_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<String>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            conversation_history: Vec::new(),
            persist_conversation: false,
            use_rag_search: default_use_rag_search(),
            llm_config_id: None,
            thread_id: None,
            category_ids: Vec::new(),
        }
    }
}

fn default_use_rag_search() -> bool {
    true
}

/// A complete conversational request, identical for both transports.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub conversation_id: String,
    pub text: String,
    pub options: ChatOptions,
}

/// Reply of the single-shot (non-streaming) chat transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub documents: Vec<ContextDocument>,
    #[serde(default)]
    pub similarity: Option<f64>,
    #[serde(default)]
    pub assistant_message_id: Option<String>,
}

impl ChatResponse {
    /// The answer text, preferring `answer` over `content`.
    pub fn text(&self) -> &str {
        self.answer
            .as_deref()
            .filter(|a| !a.is_empty())
            .or(self.content.as_deref())
            .unwrap_or_default()
    }
}

/// Summary of an uploaded document, as returned by the listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    #[serde(default, alias = "document_id")]
    pub id: Option<String>,
    #[serde(default, alias = "file_name")]
    pub file_name: Option<String>,
    #[serde(default, alias = "file_type")]
    pub file_type: Option<String>,
    #[serde(default, alias = "file_size")]
    pub file_size: Option<u64>,
    #[serde(default, alias = "analysis_status")]
    pub analysis_status: Option<String>,
    #[serde(default, alias = "total_chunks")]
    pub total_chunks: Option<u32>,
}

/// One page of the document listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPage {
    #[serde(default, alias = "items")]
    pub documents: Vec<DocumentSummary>,
    #[serde(default)]
    pub total: u64,
}

/// Context passed to the persistence hook for a finished exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistContext {
    pub should_persist: bool,
    pub resolved_thread_id: Option<String>,
    pub user_message_id: MessageId,
}

/// How a scroll-to-bottom request should be animated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ScrollBehavior {
    /// Jump immediately; used for incremental flushes.
    Auto,
    /// Animate; used when a response finishes.
    Smooth,
}
