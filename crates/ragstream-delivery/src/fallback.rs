// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Non-streaming fallback: failure classification and simulated replay.
//!
//! When the stream transport fails at the transport level, the same request
//! is re-issued through the single-shot transport and its answer is replayed
//! in fixed-size character slices so the view still sees a stream.

use std::collections::VecDeque;
use std::time::Duration;

use ragstream_core::{ChatResponse, DeliveryError, MessageId};
use strum::Display;
use tokio::time::Instant;

/// Whether a streaming failure may be retried without streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Recoverability {
    Recoverable,
    Fatal,
}

/// Transport failures are recoverable; everything the service said is final.
pub fn classify(err: &DeliveryError) -> Recoverability {
    match err {
        DeliveryError::Transport { .. } => Recoverability::Recoverable,
        DeliveryError::Application { .. }
        | DeliveryError::FallbackFailed { .. }
        | DeliveryError::NoTransport
        | DeliveryError::Config(_)
        | DeliveryError::Internal(_) => Recoverability::Fatal,
    }
}

/// Combines the two failures of a stream attempt and its fallback.
pub fn fallback_failed(streaming: DeliveryError, fallback: DeliveryError) -> DeliveryError {
    DeliveryError::FallbackFailed {
        streaming: Box::new(streaming),
        fallback: Box::new(fallback),
    }
}

/// Splits `text` into slices of at most `size` characters.
///
/// Slicing is by `char`, never by byte, so multi-byte text is never cut
/// inside a code point. A zero `size` is treated as one.
pub fn char_slices(text: &str, size: usize) -> VecDeque<String> {
    let size = size.max(1);
    let mut slices = VecDeque::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == size {
            slices.push_back(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        slices.push_back(current);
    }
    slices
}

/// A fallback answer being replayed into one message.
#[derive(Debug)]
pub struct Replay {
    message_id: MessageId,
    response: ChatResponse,
    slices: VecDeque<String>,
    interval: Duration,
    next_at: Instant,
}

impl Replay {
    /// Starts a replay whose first slice is due immediately.
    pub fn new(
        message_id: MessageId,
        response: ChatResponse,
        chunk_chars: usize,
        interval: Duration,
        now: Instant,
    ) -> Self {
        let slices = char_slices(response.text(), chunk_chars);
        Self {
            message_id,
            response,
            slices,
            interval,
            next_at: now,
        }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn into_response(self) -> ChatResponse {
        self.response
    }

    /// When the next slice is due.
    pub fn next_at(&self) -> Instant {
        self.next_at
    }

    pub fn is_finished(&self) -> bool {
        self.slices.is_empty()
    }

    /// Takes the next slice and schedules the one after it.
    pub fn next_slice(&mut self, now: Instant) -> Option<String> {
        let slice = self.slices.pop_front()?;
        self.next_at = now + self.interval;
        Some(slice)
    }
}
