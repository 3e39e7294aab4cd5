// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE parser for the streaming chat endpoint.
//!
//! Converts a response byte stream into [`TransportEvent`]s using the
//! `eventsource-stream` crate for SSE framing. Recognised events:
//!
//! | event               | data                               | result            |
//! |---------------------|------------------------------------|-------------------|
//! | `chunk` / `message` | `{"content": ..}` or `{"chunk": ..}` | `Chunk`           |
//! | `context`           | JSON array of documents            | `Context`         |
//! | `done`              | anything                           | `Complete`        |
//! | `error`             | `{"message": ..}` or plain text    | `Error` (service) |
//!
//! Empty data and the `[DONE]` sentinel are skipped. Events that fail to
//! parse are logged and skipped. The end of the body ends the stream.

use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{Stream, StreamExt};
use futures::future;
use ragstream_core::{
    ContextDocument, DeliveryError, EventStream, TransportErrorKind, TransportEvent,
};
use tracing::{debug, warn};

use crate::types::{ApiErrorBody, SseChunk};

/// Data payload some servers send to mark the end of a stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Parses an SSE byte stream into transport events.
///
/// A framing or transport failure yields one [`TransportEvent::Error`] and
/// ends the stream.
pub fn parse_event_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    bytes
        .eventsource()
        .filter_map(|result| {
            future::ready(match result {
                Ok(event) => map_event(&event.event, &event.data),
                Err(e) => Some(TransportEvent::Error(stream_error(e))),
            })
        })
        .scan(false, |failed, event| {
            if *failed {
                return future::ready(None);
            }
            *failed = matches!(event, TransportEvent::Error(_));
            future::ready(Some(event))
        })
        .boxed()
}

/// Maps one SSE event to a transport event, or `None` to skip it.
pub fn map_event(name: &str, data: &str) -> Option<TransportEvent> {
    let data = data.trim();
    match name {
        "done" => Some(TransportEvent::Complete),
        "error" => Some(TransportEvent::Error(DeliveryError::application(
            None,
            error_message(data),
        ))),
        _ if data.is_empty() || data == DONE_SENTINEL => None,
        "context" => parse_context(data).map(TransportEvent::Context),
        "chunk" | "message" => parse_chunk(data).map(TransportEvent::Chunk),
        other => {
            debug!(event = other, "ignoring unknown SSE event");
            None
        }
    }
}

fn parse_chunk(data: &str) -> Option<String> {
    match serde_json::from_str::<SseChunk>(data) {
        Ok(chunk) => Some(chunk.into_text()).filter(|text| !text.is_empty()),
        Err(e) => {
            warn!(error = %e, data, "skipping unparseable chunk event");
            None
        }
    }
}

fn parse_context(data: &str) -> Option<Vec<ContextDocument>> {
    let value = match serde_json::from_str::<serde_json::Value>(data) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "skipping unparseable context event");
            return None;
        }
    };
    if !value.is_array() {
        return Some(Vec::new());
    }
    match serde_json::from_value::<Vec<ContextDocument>>(value) {
        Ok(documents) => Some(documents),
        Err(e) => {
            warn!(error = %e, "context documents have an unexpected shape");
            Some(Vec::new())
        }
    }
}

fn error_message(data: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(data)
        .ok()
        .and_then(ApiErrorBody::into_message)
        .or_else(|| Some(data.to_string()).filter(|d| !d.is_empty()))
        .unwrap_or_else(|| "the stream reported an error".to_string())
}

fn stream_error<E>(err: EventStreamError<E>) -> DeliveryError
where
    E: std::error::Error + Send + Sync + 'static,
{
    match err {
        EventStreamError::Transport(inner) => DeliveryError::Transport {
            kind: TransportErrorKind::ConnectionReset,
            message: format!("stream interrupted: {inner}"),
            source: Some(Box::new(inner)),
        },
        other => DeliveryError::transport(
            TransportErrorKind::Io,
            format!("malformed event stream: {other}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;

    async fn collect(parts: &[&'static str]) -> Vec<TransportEvent> {
        let bytes = stream::iter(
            parts
                .iter()
                .map(|p| Ok::<_, io::Error>(p.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        );
        parse_event_stream(bytes).collect().await
    }

    fn texts(events: &[TransportEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Chunk(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn chunk_and_message_events_become_chunks() {
        let events = collect(&[
            "event: chunk\ndata: {\"content\":\"Hel\"}\n\n",
            "event: message\ndata: {\"chunk\":\"lo\"}\n\n",
        ])
        .await;
        assert_eq!(texts(&events), vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn events_split_across_reads_are_reassembled() {
        let events = collect(&[
            "event: chu",
            "nk\ndata: {\"content\":\"안녕",
            "하세요\"}\n\n",
        ])
        .await;
        assert_eq!(texts(&events), vec!["안녕하세요"]);
    }

    #[tokio::test]
    async fn context_event_carries_documents() {
        let events = collect(&[
            "event: context\ndata: [{\"fileName\":\"guide.pdf\",\"similarity\":0.8}]\n\n",
        ])
        .await;
        match &events[..] {
            [TransportEvent::Context(docs)] => {
                assert_eq!(docs[0].file_name.as_deref(), Some("guide.pdf"));
                assert_eq!(docs[0].similarity, Some(0.8));
            }
            other => panic!("expected one context event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_array_context_clears_documents() {
        let events = collect(&["event: context\ndata: {\"unexpected\":true}\n\n"]).await;
        assert!(matches!(&events[..], [TransportEvent::Context(docs)] if docs.is_empty()));
    }

    #[tokio::test]
    async fn done_sentinel_and_blank_data_are_skipped() {
        let events = collect(&[
            "event: chunk\ndata: [DONE]\n\n",
            "event: chunk\ndata: \n\n",
            "event: chunk\ndata: {\"content\":\"x\"}\n\n",
        ])
        .await;
        assert_eq!(events.len(), 1);
        assert_eq!(texts(&events), vec!["x"]);
    }

    #[tokio::test]
    async fn done_event_completes() {
        let events = collect(&["event: done\ndata: [DONE]\n\n"]).await;
        assert!(matches!(&events[..], [TransportEvent::Complete]));
    }

    #[tokio::test]
    async fn error_event_is_a_service_error() {
        let events = collect(&["event: error\ndata: {\"message\":\"quota exceeded\"}\n\n"]).await;
        match &events[..] {
            [TransportEvent::Error(err)] => {
                assert!(err.transport_kind().is_none());
                assert_eq!(err.user_message(), "quota exceeded");
            }
            other => panic!("expected one error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_and_unknown_events_are_skipped() {
        let events = collect(&[
            "event: chunk\ndata: not json\n\n",
            "event: heartbeat\ndata: {}\n\n",
            "event: chunk\ndata: {\"content\":\"ok\"}\n\n",
        ])
        .await;
        assert_eq!(texts(&events), vec!["ok"]);
    }

    #[tokio::test]
    async fn transport_failure_ends_stream_with_recoverable_error() {
        let bytes = stream::iter(vec![
            Ok(b"event: chunk\ndata: {\"content\":\"par\"}\n\n".to_vec()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
            Ok(b"event: chunk\ndata: {\"content\":\"never\"}\n\n".to_vec()),
        ]);
        let events: Vec<_> = parse_event_stream(bytes).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(texts(&events), vec!["par"]);
        match &events[1] {
            TransportEvent::Error(err) => {
                assert_eq!(err.transport_kind(), Some(TransportErrorKind::ConnectionReset));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }
}
