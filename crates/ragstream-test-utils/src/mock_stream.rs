// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted streaming transport for deterministic testing.
//!
//! Each `subscribe()` call consumes the next [`Script`]: either a fixed list
//! of events or a live channel fed by a [`StreamDriver`] from the test body.
//! Every stream ends as soon as its cancellation token fires.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::{StreamExt, stream};
use ragstream_core::{
    ChatRequest, ContextDocument, DeliveryError, EventStream, StreamTransport, TransportEvent,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What one subscription will yield.
pub enum Script {
    Events(Vec<TransportEvent>),
    Live(mpsc::UnboundedReceiver<TransportEvent>),
}

/// Feeds events into a live script.
#[derive(Debug, Clone)]
pub struct StreamDriver {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl StreamDriver {
    /// Sends an event. Returns `false` once the subscription is gone.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn chunk(&self, text: &str) -> bool {
        self.send(TransportEvent::Chunk(text.to_string()))
    }

    pub fn context(&self, documents: Vec<ContextDocument>) -> bool {
        self.send(TransportEvent::Context(documents))
    }

    pub fn complete(&self) -> bool {
        self.send(TransportEvent::Complete)
    }

    pub fn error(&self, err: DeliveryError) -> bool {
        self.send(TransportEvent::Error(err))
    }

    /// True once the subscriber has dropped its stream.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A [`StreamTransport`] that replays queued scripts.
///
/// With an empty queue a subscription completes immediately.
#[derive(Default)]
pub struct ScriptedStreamTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    tokens: Arc<Mutex<Vec<CancellationToken>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedStreamTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose first subscription yields `events`.
    pub fn with_events(events: Vec<TransportEvent>) -> Self {
        let transport = Self::new();
        transport.push_events(events);
        transport
    }

    /// A transport whose first subscription is live, plus its driver.
    pub fn live() -> (Self, StreamDriver) {
        let transport = Self::new();
        let driver = transport.push_live();
        (transport, driver)
    }

    pub fn push_events(&self, events: Vec<TransportEvent>) {
        lock(&self.scripts).push_back(Script::Events(events));
    }

    pub fn push_live(&self) -> StreamDriver {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.scripts).push_back(Script::Live(rx));
        StreamDriver { tx }
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    /// Cancellation tokens handed out so far, in order.
    pub fn tokens(&self) -> Vec<CancellationToken> {
        lock(&self.tokens).clone()
    }

    pub fn subscription_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl StreamTransport for ScriptedStreamTransport {
    fn subscribe(&self, request: ChatRequest, cancel: CancellationToken) -> EventStream {
        lock(&self.requests).push(request);
        lock(&self.tokens).push(cancel.clone());

        let script = lock(&self.scripts)
            .pop_front()
            .unwrap_or_else(|| Script::Events(vec![TransportEvent::Complete]));

        let events: EventStream = match script {
            Script::Events(events) => stream::iter(events).boxed(),
            Script::Live(rx) => {
                stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|e| (e, rx)) })
                    .boxed()
            }
        };
        events.take_until(cancel.cancelled_owned()).boxed()
    }
}
