// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the chat backend.
//!
//! Provides [`RagClient`], which implements the single-shot, streaming, and
//! document-listing contracts over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use ragstream_config::BackendConfig;
use ragstream_core::{
    ChatRequest, ChatResponse, ChatTransport, DeliveryError, DocumentLister, DocumentPage,
    EventStream, StreamTransport, TransportErrorKind, TransportEvent,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::sse;
use crate::types::{ApiErrorBody, ChatPayload};

const EVENT_STREAM_MIME: &str = "text/event-stream";

/// HTTP client for chat backend communication.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct RagClient {
    client: reqwest::Client,
    base_url: String,
    chat_path: String,
    stream_path: String,
    documents_path: String,
    api_token: Option<String>,
    request_timeout: Duration,
}

impl RagClient {
    /// Creates a client from the `[backend]` config section.
    pub fn new(config: &BackendConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DeliveryError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_path: config.chat_path.clone(),
            stream_path: config.stream_path.clone(),
            documents_path: config.documents_path.clone(),
            api_token: config.api_token.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends the streaming request and returns the parsed event stream.
    async fn open_stream(&self, request: &ChatRequest) -> Result<EventStream, DeliveryError> {
        let response = self
            .authorize(self.client.post(self.url(&self.stream_path)))
            .header(ACCEPT, EVENT_STREAM_MIME)
            .json(&ChatPayload::from(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        debug!(status = %status, "stream response received");
        if !status.is_success() {
            return Err(application_error(response).await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(EVENT_STREAM_MIME);
        if !content_type.starts_with(EVENT_STREAM_MIME) {
            return Err(DeliveryError::transport(
                TransportErrorKind::UnsupportedStreaming,
                format!("expected an event stream, got {content_type}"),
            ));
        }

        info!(conversation = %request.conversation_id, "event stream opened");
        Ok(sse::parse_event_stream(response.bytes_stream()))
    }
}

/// Maps a `reqwest` failure to a transport error.
fn transport_error(e: reqwest::Error) -> DeliveryError {
    let kind = if e.is_body() || e.is_decode() {
        TransportErrorKind::ConnectionReset
    } else {
        TransportErrorKind::Io
    };
    DeliveryError::Transport {
        kind,
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Builds a service error from a non-2xx response.
async fn application_error(response: Response) -> DeliveryError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(ApiErrorBody::into_message)
        .unwrap_or_else(|| format!("backend returned {status}"));
    DeliveryError::application(Some(status.as_u16()), message)
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
    status: StatusCode,
) -> Result<T, DeliveryError> {
    let body = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&body).map_err(|e| {
        DeliveryError::application(
            Some(status.as_u16()),
            format!("failed to parse backend response: {e}"),
        )
    })
}

#[async_trait]
impl ChatTransport for RagClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, DeliveryError> {
        let response = self
            .authorize(self.client.post(self.url(&self.chat_path)))
            .timeout(self.request_timeout)
            .json(&ChatPayload::from(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        debug!(status = %status, "chat response received");
        if !status.is_success() {
            return Err(application_error(response).await);
        }
        read_json(response, status).await
    }
}

impl StreamTransport for RagClient {
    fn subscribe(&self, request: ChatRequest, cancel: CancellationToken) -> EventStream {
        let client = self.clone();
        let opened = async move { client.open_stream(&request).await };
        stream::once(opened)
            .flat_map(|opened| match opened {
                Ok(events) => events,
                Err(e) => stream::iter([TransportEvent::Error(e)]).boxed(),
            })
            .take_until(cancel.cancelled_owned())
            .boxed()
    }
}

#[async_trait]
impl DocumentLister for RagClient {
    async fn list_documents(
        &self,
        conversation_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<DocumentPage, DeliveryError> {
        let mut url = Url::parse(&self.url(&self.documents_path))
            .map_err(|e| DeliveryError::Config(format!("invalid documents URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("projectId", conversation_id)
            .append_pair("page", &page.to_string())
            .append_pair("size", &page_size.to_string());

        let response = self
            .authorize(self.client.get(url))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        debug!(status = %status, page, page_size, "document listing received");
        if !status.is_success() {
            return Err(application_error(response).await);
        }
        read_json(response, status).await
    }
}
