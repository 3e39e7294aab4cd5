// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation history sent back to the remote service as context.

use ragstream_core::{HistoryEntry, Message};

/// Finalized, non-blank turns in display order.
///
/// Streaming messages are skipped: their text is incomplete and the remote
/// service would see a half-written answer.
pub fn build_history(messages: &[Message]) -> Vec<HistoryEntry> {
    messages
        .iter()
        .filter(|m| !m.is_streaming && !m.content.trim().is_empty())
        .map(|m| HistoryEntry {
            role: m.role,
            content: m.content.clone(),
            timestamp: m.timestamp,
        })
        .collect()
}
