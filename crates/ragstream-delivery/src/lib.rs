// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental chat-response delivery for ragstream.
//!
//! The [`ChatController`] consumes a streamed answer from a remote service and
//! delivers it into a conversation view:
//! - chunks are buffered and committed at a bounded cadence ([`buffer`])
//! - transport failures fall back to a single-shot request whose answer is
//!   replayed as a simulated stream ([`fallback`])
//! - the viewport follows new content unless the user scrolled away ([`scroll`])
//! - message ids stay unique and history excludes unfinished turns
//!   ([`identity`], [`history`])

pub mod buffer;
pub mod controller;
pub mod fallback;
pub mod history;
pub mod identity;
pub mod scroll;
pub mod session;

pub use controller::{
    ChatController, ChatHandle, ControllerBuilder, ConversationSnapshot, ViewCommand,
    options_from_config,
};
pub use fallback::{Recoverability, classify};
pub use history::build_history;
pub use identity::{dedupe, new_id};
pub use scroll::{AutoFollow, ScrollEvent, ScrollPolicy};
