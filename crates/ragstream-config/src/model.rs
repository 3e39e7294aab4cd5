// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for ragstream.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so that a mistyped key is
//! reported at startup instead of silently falling back to a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level ragstream configuration.
///
/// Every section is optional and defaults to the values documented on its fields.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RagstreamConfig {
    /// Application identity and logging.
    #[serde(default)]
    pub app: AppConfig,

    /// Pacing and scroll behavior of the delivery pipeline.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Remote chat backend connection settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Per-conversation request defaults.
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Application identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Display name used in log lines.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_app_name() -> String {
    "ragstream".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Delivery pipeline pacing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Delay between the first buffered chunk and the flush that commits it.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Characters per slice when replaying a fallback answer.
    #[serde(default = "default_fallback_chunk_chars")]
    pub fallback_chunk_chars: usize,

    /// Delay between replayed fallback slices.
    #[serde(default = "default_fallback_interval_ms")]
    pub fallback_interval_ms: u64,

    /// Distance from the bottom (px) beyond which auto-follow detaches.
    #[serde(default = "default_scroll_threshold_px")]
    pub scroll_threshold_px: f64,

    /// Distance (px) still treated as "exactly at the bottom".
    #[serde(default = "default_bottom_tolerance_px")]
    pub bottom_tolerance_px: f64,

    /// Replay a non-streaming answer when the stream transport fails.
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            fallback_chunk_chars: default_fallback_chunk_chars(),
            fallback_interval_ms: default_fallback_interval_ms(),
            scroll_threshold_px: default_scroll_threshold_px(),
            bottom_tolerance_px: default_bottom_tolerance_px(),
            fallback_enabled: true,
        }
    }
}

impl DeliveryConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn fallback_interval(&self) -> Duration {
        Duration::from_millis(self.fallback_interval_ms)
    }
}

fn default_flush_interval_ms() -> u64 {
    16
}

fn default_fallback_chunk_chars() -> usize {
    8
}

fn default_fallback_interval_ms() -> u64 {
    24
}

fn default_scroll_threshold_px() -> f64 {
    80.0
}

fn default_bottom_tolerance_px() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Remote backend connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the chat backend, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request. `None` sends no authorization.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Timeout for single-shot requests. Streams are never timed out.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Path of the single-shot chat endpoint.
    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    /// Path of the SSE chat endpoint.
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// Path of the document listing endpoint.
    #[serde(default = "default_documents_path")]
    pub documents_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            chat_path: default_chat_path(),
            stream_path: default_stream_path(),
            documents_path: default_documents_path(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_chat_path() -> String {
    "/api/rag/chat".to_string()
}

fn default_stream_path() -> String {
    "/api/rag/chat/stream".to_string()
}

fn default_documents_path() -> String {
    "/api/rag/documents".to_string()
}

/// Defaults applied to every submitted chat message.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Conversation (project) the messages belong to.
    #[serde(default)]
    pub conversation_id: Option<String>,

    /// Ask the backend to durably record exchanges (uses the non-streaming path).
    #[serde(default)]
    pub persist_conversation: bool,

    /// Retrieve supporting documents for each answer.
    #[serde(default = "default_true")]
    pub use_rag_search: bool,

    /// LLM configuration to use; `None` lets the backend pick its default.
    #[serde(default)]
    pub llm_config_id: Option<String>,

    /// Page size for document listings.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            conversation_id: None,
            persist_conversation: false,
            use_rag_search: true,
            llm_config_id: None,
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    100
}
