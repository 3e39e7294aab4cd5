// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat transports: single-shot, streaming, and document listing.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::DeliveryError;
use crate::types::{ChatRequest, ChatResponse, ContextDocument, DocumentPage};

/// A tagged event yielded by a streaming subscription.
#[derive(Debug)]
pub enum TransportEvent {
    /// An incremental fragment of response text.
    Chunk(String),
    /// Supporting context for the response, delivered out-of-band.
    Context(Vec<ContextDocument>),
    /// The response finished successfully.
    Complete,
    /// The transport or the remote service failed.
    Error(DeliveryError),
}

/// The event stream of one streaming subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// Single-shot request/response chat transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends the request and waits for the complete answer.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, DeliveryError>;
}

/// Streaming chat transport.
///
/// Implementations must stop yielding events once `cancel` is triggered
/// and should end the stream after [`TransportEvent::Complete`] or
/// [`TransportEvent::Error`].
pub trait StreamTransport: Send + Sync {
    /// Opens a cancellable subscription for the request.
    ///
    /// Connection happens lazily when the stream is first polled; failures
    /// surface as a [`TransportEvent::Error`] item.
    fn subscribe(&self, request: ChatRequest, cancel: CancellationToken) -> EventStream;
}

/// Lists documents uploaded to a conversation's project.
#[async_trait]
pub trait DocumentLister: Send + Sync {
    async fn list_documents(
        &self,
        conversation_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<DocumentPage, DeliveryError>;
}
