// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One in-flight response and its cancellation handle.

use std::sync::atomic::{AtomicU64, Ordering};

use ragstream_core::{ChatRequest, MessageId};
use tokio_util::sync::CancellationToken;
use tracing::info;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// A cancellable session bound to the assistant message it fills.
///
/// The token is a child of the controller's shutdown token, so shutting the
/// controller down cancels whatever session is active.
#[derive(Debug)]
pub struct StreamingSession {
    seq: u64,
    target_message_id: MessageId,
    user_message_id: MessageId,
    request: ChatRequest,
    token: CancellationToken,
}

impl StreamingSession {
    pub fn new(
        target_message_id: MessageId,
        user_message_id: MessageId,
        request: ChatRequest,
        parent: &CancellationToken,
    ) -> Self {
        let seq = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        info!(session = seq, message_id = %target_message_id, "session opened");
        Self {
            seq,
            target_message_id,
            user_message_id,
            request,
            token: parent.child_token(),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn target_message_id(&self) -> &MessageId {
        &self.target_message_id
    }

    /// Points the session at another message (fallback into a fresh slot).
    pub fn retarget(&mut self, message_id: MessageId) {
        self.target_message_id = message_id;
    }

    pub fn user_message_id(&self) -> &MessageId {
        &self.user_message_id
    }

    pub fn request(&self) -> &ChatRequest {
        &self.request
    }

    /// Token handed to the transport for this session.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signals cancellation. Returns `true` only for the first call.
    pub fn cancel(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        info!(session = self.seq, message_id = %self.target_message_id, "session cancelled");
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether an event for `message_id` may still mutate state.
    pub fn accepts(&self, message_id: &MessageId) -> bool {
        !self.is_cancelled() && self.target_message_id == *message_id
    }
}
