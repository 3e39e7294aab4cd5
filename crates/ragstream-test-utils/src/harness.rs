// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end delivery tests.
//!
//! `TestHarness` spawns a [`ChatController`] wired to scripted transports,
//! a recording viewport, and a recording persistence hook.

use std::sync::Arc;

use ragstream_config::DeliveryConfig;
use ragstream_core::{ChatOptions, DeliveryError, Message};
use ragstream_delivery::{ChatController, ChatHandle, ConversationSnapshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::mock_chat::MockChatTransport;
use crate::mock_stream::ScriptedStreamTransport;
use crate::recording::{RecordingPersistence, RecordingViewport};

/// Builder for creating test environments with configurable collaborators.
pub struct TestHarnessBuilder {
    conversation_id: String,
    config: DeliveryConfig,
    stream: Option<Arc<ScriptedStreamTransport>>,
    chat: Option<Arc<MockChatTransport>>,
    persistence: Arc<RecordingPersistence>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            conversation_id: "test-project".to_string(),
            config: DeliveryConfig::default(),
            stream: None,
            chat: None,
            persistence: Arc::new(RecordingPersistence::new()),
        }
    }

    pub fn with_conversation_id(mut self, id: &str) -> Self {
        self.conversation_id = id.to_string();
        self
    }

    pub fn with_config(mut self, config: DeliveryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_stream_transport(mut self, transport: ScriptedStreamTransport) -> Self {
        self.stream = Some(Arc::new(transport));
        self
    }

    pub fn with_chat_transport(mut self, transport: MockChatTransport) -> Self {
        self.chat = Some(Arc::new(transport));
        self
    }

    pub fn with_persistence(mut self, hook: RecordingPersistence) -> Self {
        self.persistence = Arc::new(hook);
        self
    }

    /// Spawns the controller. Must be called inside a tokio runtime.
    pub fn build(self) -> TestHarness {
        let viewport = RecordingViewport::new();
        let shutdown = CancellationToken::new();

        let mut builder = ChatController::builder(self.conversation_id)
            .config(self.config)
            .viewport(Box::new(viewport.clone()))
            .persistence(self.persistence.clone());
        if let Some(stream) = &self.stream {
            builder = builder.stream_transport(stream.clone());
        }
        if let Some(chat) = &self.chat {
            builder = builder.chat_transport(chat.clone());
        }
        let (handle, task) = builder.spawn(shutdown.clone());

        TestHarness {
            handle,
            stream: self.stream,
            chat: self.chat,
            persistence: self.persistence,
            viewport,
            shutdown,
            task,
        }
    }
}

/// A running controller plus the mocks it talks to.
pub struct TestHarness {
    pub handle: ChatHandle,
    pub stream: Option<Arc<ScriptedStreamTransport>>,
    pub chat: Option<Arc<MockChatTransport>>,
    pub persistence: Arc<RecordingPersistence>,
    pub viewport: RecordingViewport,
    pub shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Submits `text` with default options.
    pub async fn submit(&self, text: &str) -> Result<(), DeliveryError> {
        self.handle.submit(text, ChatOptions::default()).await
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.handle.snapshot()
    }

    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&ConversationSnapshot) -> bool,
    ) -> Result<ConversationSnapshot, DeliveryError> {
        self.handle.wait_for(predicate).await
    }

    /// Waits for a snapshot with a session running.
    ///
    /// Only reliable when the session can not finish on its own, e.g. while
    /// a live [`StreamDriver`](crate::StreamDriver) holds it open.
    pub async fn wait_until_busy(&self) -> Result<ConversationSnapshot, DeliveryError> {
        self.wait_for(|s| !s.is_idle()).await
    }

    /// Waits for an idle snapshot published after `revision`.
    pub async fn wait_idle_after(
        &self,
        revision: u64,
    ) -> Result<ConversationSnapshot, DeliveryError> {
        self.wait_for(|s| s.revision > revision && s.is_idle()).await
    }

    /// Submits `text` and waits until the resulting session has finished.
    pub async fn run_to_idle(&self, text: &str) -> Result<ConversationSnapshot, DeliveryError> {
        let revision = self.snapshot().revision;
        self.submit(text).await?;
        self.wait_idle_after(revision).await
    }

    /// The last assistant message of the latest snapshot.
    pub fn last_assistant(&self) -> Option<Message> {
        self.snapshot().last_assistant().cloned()
    }

    /// Lets the controller drain everything that is ready without moving time.
    pub async fn settle(&self) {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    /// Cancels the controller and waits for it to stop.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.task.await;
    }
}
