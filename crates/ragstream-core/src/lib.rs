// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the ragstream delivery pipeline.
//!
//! This crate provides the error taxonomy, the conversation data model, and
//! the collaborator traits (transports, persistence hook, viewport) that the
//! delivery crate and the HTTP client implement or consume.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{DeliveryError, TransportErrorKind};
pub use types::{
    ChatOptions, ChatRequest, ChatResponse, ContextDocument, DocumentPage, DocumentSummary,
    HistoryEntry, Message, MessageId,
    PersistContext, Role, ScrollBehavior,
};

pub use traits::{
    ChatTransport, DocumentLister, EventStream, PersistenceHook, StreamTransport,
    TransportEvent, Viewport,
};
