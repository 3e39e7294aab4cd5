// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message identity: id generation and duplicate repair.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use ragstream_core::{Message, MessageId};
use tracing::{debug, warn};

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a fresh message id.
///
/// Uses a random (v4) UUID from the OS generator. If the OS generator fails,
/// a `msg-<millis>-<counter>-<random>` composite is used instead.
pub fn new_id() -> MessageId {
    let mut bytes = [0u8; 16];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => MessageId(
            uuid::Builder::from_random_bytes(bytes)
                .into_uuid()
                .to_string(),
        ),
        Err(err) => {
            warn!(error = %err, "OS random source unavailable, using composite id");
            composite_id()
        }
    }
}

fn composite_id() -> MessageId {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let count = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
    let seed = (now.as_nanos() as u64) ^ count.rotate_left(32);
    let noise = StdRng::seed_from_u64(seed).next_u32();
    MessageId(format!("msg-{:x}-{count:x}-{noise:08x}", now.as_millis()))
}

/// Repairs missing and duplicate ids in a single pass.
///
/// The first occurrence of an id keeps it; later duplicates and blank ids
/// get a fresh one. Every other field is left untouched.
pub fn dedupe(mut messages: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::with_capacity(messages.len());
    for message in &mut messages {
        if message.id.is_missing() || seen.contains(&message.id) {
            let replacement = new_id();
            debug!(old = %message.id, new = %replacement, "reassigned message id");
            message.id = replacement;
        }
        seen.insert(message.id.clone());
    }
    messages
}
