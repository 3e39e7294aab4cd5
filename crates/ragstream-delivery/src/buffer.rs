// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending-text buffer and flush scheduling.
//!
//! Arriving chunks never touch the rendered message directly. They collect in
//! a [`PendingBuffer`] and are committed by a flush at most once per flush
//! interval, so the number of re-renders depends on elapsed time rather than
//! on how many chunks the transport produced.

use std::time::Duration;

use ragstream_core::{Message, MessageId};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Text received for one message but not yet committed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBuffer {
    pub message_id: MessageId,
    pub pending: String,
}

/// Result of committing a flush to the message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The text was appended to the target message.
    Applied,
    /// The target no longer exists (or is finalized); the text was dropped.
    TargetMissing,
}

/// Owns the pending buffer and the one-shot flush deadline.
///
/// Time is passed in by the caller so the scheduler itself stays synchronous;
/// the controller waits on [`FlushScheduler::deadline`] in its select loop.
#[derive(Debug)]
pub struct FlushScheduler {
    interval: Duration,
    buffer: Option<PendingBuffer>,
    deadline: Option<Instant>,
}

impl FlushScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            buffer: None,
            deadline: None,
        }
    }

    /// Appends a chunk for `target` and arms the flush deadline.
    ///
    /// A buffer that belongs to a different message is replaced, never
    /// appended to, so two sessions can not interleave into one message.
    pub fn push(&mut self, target: &MessageId, chunk: &str, now: Instant) {
        if chunk.is_empty() {
            return;
        }
        match &mut self.buffer {
            Some(buffer) if buffer.message_id == *target => buffer.pending.push_str(chunk),
            slot => {
                if let Some(old) = slot.as_ref() {
                    debug!(
                        stale_message_id = %old.message_id,
                        message_id = %target,
                        "replacing stale pending buffer"
                    );
                }
                *slot = Some(PendingBuffer {
                    message_id: target.clone(),
                    pending: chunk.to_string(),
                });
            }
        }
        self.schedule_flush(now);
    }

    /// Arms the deadline `now + interval` unless one is already armed.
    pub fn schedule_flush(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.interval);
        }
    }

    /// The armed deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Takes the pending text if the deadline has passed.
    ///
    /// The deadline is disarmed whenever it is due, even if nothing is pending.
    pub fn take_due(&mut self, now: Instant) -> Option<PendingBuffer> {
        match self.deadline {
            Some(deadline) if deadline <= now => self.force_flush(),
            _ => None,
        }
    }

    /// Disarms the deadline and takes whatever is pending right away.
    pub fn force_flush(&mut self) -> Option<PendingBuffer> {
        self.deadline = None;
        let buffer = self.buffer.as_mut()?;
        if buffer.pending.is_empty() {
            return None;
        }
        Some(PendingBuffer {
            message_id: buffer.message_id.clone(),
            pending: std::mem::take(&mut buffer.pending),
        })
    }

    /// Drops pending text and disarms the deadline.
    pub fn reset(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            if !buffer.pending.is_empty() {
                debug!(
                    message_id = %buffer.message_id,
                    chars = buffer.pending.chars().count(),
                    "discarding unflushed text"
                );
            }
        }
        self.deadline = None;
    }
}

/// Appends a flushed buffer to its target message.
///
/// Only a message that is still streaming accepts text; anything else is
/// treated as gone and the flush is dropped.
pub fn apply_flush(messages: &mut [Message], flush: PendingBuffer) -> FlushOutcome {
    match messages
        .iter_mut()
        .find(|m| m.id == flush.message_id && m.is_streaming)
    {
        Some(message) => {
            debug!(
                message_id = %flush.message_id,
                chars = flush.pending.chars().count(),
                "flushed pending text"
            );
            message.content.push_str(&flush.pending);
            FlushOutcome::Applied
        }
        None => {
            warn!(message_id = %flush.message_id, "flush target missing, dropping text");
            FlushOutcome::TargetMissing
        }
    }
}
