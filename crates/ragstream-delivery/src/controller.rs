// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session controller: one dispatch loop owning the conversation.
//!
//! [`ChatController::run`] is a single task that `select!`s over view
//! commands, the active session's event source (stream, pending request, or
//! replay tick), and the flush deadline. All state lives in that task; the
//! view only ever sees immutable [`ConversationSnapshot`]s published through
//! a `watch` channel.

use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use ragstream_config::{ChatConfig, DeliveryConfig};
use ragstream_core::{
    ChatOptions, ChatRequest, ChatResponse, ChatTransport, DeliveryError, EventStream, Message,
    MessageId, PersistContext, PersistenceHook, Role, ScrollBehavior, StreamTransport,
    TransportEvent, Viewport,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buffer::{FlushOutcome, FlushScheduler, apply_flush};
use crate::fallback::{Recoverability, Replay, classify, fallback_failed};
use crate::history::build_history;
use crate::identity::{dedupe, new_id};
use crate::scroll::{AutoFollow, ScrollCoordinator, ScrollEvent, ScrollPolicy};
use crate::session::StreamingSession;

const COMMAND_CAPACITY: usize = 32;

/// Something the user did in the conversation view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    /// Send a message. History in `options` is replaced with the current one.
    Submit { text: String, options: ChatOptions },
    /// The user scrolled the message list.
    Scrolled { distance_from_bottom: f64 },
    /// Stop the in-flight response, keeping the text received so far.
    Stop,
    /// Drop the whole conversation.
    Clear,
}

/// What the view renders. Each publish bumps `revision`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSnapshot {
    pub messages: Arc<Vec<Message>>,
    pub is_streaming: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub auto_follow: AutoFollow,
    pub revision: u64,
}

impl Default for ConversationSnapshot {
    fn default() -> Self {
        Self {
            messages: Arc::new(Vec::new()),
            is_streaming: false,
            is_loading: false,
            error: None,
            auto_follow: AutoFollow::Following,
            revision: 0,
        }
    }
}

impl ConversationSnapshot {
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == *id)
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// True when no session is running.
    pub fn is_idle(&self) -> bool {
        !self.is_streaming && !self.is_loading
    }
}

/// Default request options derived from the `[chat]` config section.
pub fn options_from_config(config: &ChatConfig) -> ChatOptions {
    ChatOptions {
        persist_conversation: config.persist_conversation,
        use_rag_search: config.use_rag_search,
        llm_config_id: config.llm_config_id.clone(),
        ..ChatOptions::default()
    }
}

/// Cloneable handle used by the view to drive a running controller.
#[derive(Debug, Clone)]
pub struct ChatHandle {
    commands: mpsc::Sender<ViewCommand>,
    snapshots: watch::Receiver<ConversationSnapshot>,
}

impl ChatHandle {
    pub async fn send(&self, command: ViewCommand) -> Result<(), DeliveryError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| DeliveryError::Internal("chat controller has stopped".into()))
    }

    pub async fn submit(
        &self,
        text: impl Into<String>,
        options: ChatOptions,
    ) -> Result<(), DeliveryError> {
        self.send(ViewCommand::Submit {
            text: text.into(),
            options,
        })
        .await
    }

    pub async fn scrolled(&self, distance_from_bottom: f64) -> Result<(), DeliveryError> {
        self.send(ViewCommand::Scrolled {
            distance_from_bottom,
        })
        .await
    }

    pub async fn stop(&self) -> Result<(), DeliveryError> {
        self.send(ViewCommand::Stop).await
    }

    pub async fn clear(&self) -> Result<(), DeliveryError> {
        self.send(ViewCommand::Clear).await
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that is notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshots.clone()
    }

    /// Waits until a published snapshot satisfies `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&ConversationSnapshot) -> bool,
    ) -> Result<ConversationSnapshot, DeliveryError> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| DeliveryError::Internal("chat controller has stopped".into()))?;
        Ok((*snapshot).clone())
    }
}

/// Viewport used when the caller renders without scrolling.
struct StaticViewport;

impl Viewport for StaticViewport {
    fn distance_from_bottom(&self) -> f64 {
        0.0
    }

    fn scroll_to_bottom(&mut self, _behavior: ScrollBehavior) {}
}

/// Builder for [`ChatController`].
pub struct ControllerBuilder {
    conversation_id: String,
    config: DeliveryConfig,
    stream: Option<Arc<dyn StreamTransport>>,
    chat: Option<Arc<dyn ChatTransport>>,
    persistence: Option<Arc<dyn PersistenceHook>>,
    viewport: Box<dyn Viewport>,
}

impl ControllerBuilder {
    pub fn config(mut self, config: DeliveryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn stream_transport(mut self, transport: Arc<dyn StreamTransport>) -> Self {
        self.stream = Some(transport);
        self
    }

    pub fn chat_transport(mut self, transport: Arc<dyn ChatTransport>) -> Self {
        self.chat = Some(transport);
        self
    }

    pub fn persistence(mut self, hook: Arc<dyn PersistenceHook>) -> Self {
        self.persistence = Some(hook);
        self
    }

    pub fn viewport(mut self, viewport: Box<dyn Viewport>) -> Self {
        self.viewport = viewport;
        self
    }

    /// Builds the controller and its handle. The controller stops when
    /// `shutdown` is cancelled or every handle is dropped.
    pub fn build(self, shutdown: CancellationToken) -> (ChatController, ChatHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(ConversationSnapshot::default());
        let controller = ChatController {
            conversation_id: self.conversation_id,
            scheduler: FlushScheduler::new(self.config.flush_interval()),
            scroll: ScrollCoordinator::new(ScrollPolicy::from(&self.config)),
            config: self.config,
            stream: self.stream,
            chat: self.chat,
            persistence: self.persistence,
            viewport: self.viewport,
            state: ConversationState::default(),
            activity: Activity::Idle,
            commands: command_rx,
            snapshots: snapshot_tx,
            shutdown,
        };
        let handle = ChatHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (controller, handle)
    }

    /// Builds the controller and runs it on a new task.
    pub fn spawn(self, shutdown: CancellationToken) -> (ChatHandle, JoinHandle<()>) {
        let (controller, handle) = self.build(shutdown);
        (handle, tokio::spawn(controller.run()))
    }
}

#[derive(Debug, Default)]
struct ConversationState {
    messages: Arc<Vec<Message>>,
    is_streaming: bool,
    is_loading: bool,
    error: Option<String>,
    revision: u64,
}

/// Which transport a submission goes through.
enum Route {
    Stream(Arc<dyn StreamTransport>),
    Reply(Arc<dyn ChatTransport>),
}

enum RequestMode {
    /// Single-shot path; `persist` asks the hook to record the exchange.
    Regular { persist: bool },
    /// Retry after a failed stream; keeps the stream error for reporting.
    Fallback { streaming_error: DeliveryError },
}

enum Activity {
    Idle,
    Streaming {
        session: StreamingSession,
        events: EventStream,
    },
    Requesting {
        session: StreamingSession,
        mode: RequestMode,
        reply: BoxFuture<'static, Result<ChatResponse, DeliveryError>>,
    },
    Replaying {
        session: StreamingSession,
        replay: Replay,
    },
}

impl Activity {
    fn into_session(self) -> Option<StreamingSession> {
        match self {
            Activity::Idle => None,
            Activity::Streaming { session, .. }
            | Activity::Requesting { session, .. }
            | Activity::Replaying { session, .. } => Some(session),
        }
    }
}

enum ActivityEvent {
    Stream(Option<TransportEvent>),
    Reply(Result<ChatResponse, DeliveryError>),
    ReplayTick,
}

/// Resolves when the active session has something to deliver.
async fn next_activity(activity: &mut Activity) -> ActivityEvent {
    match activity {
        Activity::Idle => std::future::pending().await,
        Activity::Streaming { events, .. } => ActivityEvent::Stream(events.next().await),
        Activity::Requesting { reply, .. } => ActivityEvent::Reply(reply.await),
        Activity::Replaying { replay, .. } => {
            tokio::time::sleep_until(replay.next_at()).await;
            ActivityEvent::ReplayTick
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn request_reply(
    transport: Arc<dyn ChatTransport>,
    request: ChatRequest,
) -> BoxFuture<'static, Result<ChatResponse, DeliveryError>> {
    async move { transport.chat(&request).await }.boxed()
}

/// Runs the hook on its own task. Failures are only logged.
fn notify_persistence(
    hook: Option<Arc<dyn PersistenceHook>>,
    response: ChatResponse,
    context: PersistContext,
) {
    let Some(hook) = hook else {
        return;
    };
    tokio::spawn(async move {
        let should_persist = context.should_persist;
        if let Err(e) = hook.handle_chat_result(&response, context).await {
            warn!(error = %e, should_persist, "persistence hook failed");
        }
    });
}

/// Owns one conversation and delivers responses into it.
pub struct ChatController {
    conversation_id: String,
    config: DeliveryConfig,
    stream: Option<Arc<dyn StreamTransport>>,
    chat: Option<Arc<dyn ChatTransport>>,
    persistence: Option<Arc<dyn PersistenceHook>>,
    viewport: Box<dyn Viewport>,
    scheduler: FlushScheduler,
    scroll: ScrollCoordinator,
    state: ConversationState,
    activity: Activity,
    commands: mpsc::Receiver<ViewCommand>,
    snapshots: watch::Sender<ConversationSnapshot>,
    shutdown: CancellationToken,
}

impl ChatController {
    pub fn builder(conversation_id: impl Into<String>) -> ControllerBuilder {
        ControllerBuilder {
            conversation_id: conversation_id.into(),
            config: DeliveryConfig::default(),
            stream: None,
            chat: None,
            persistence: None,
            viewport: Box::new(StaticViewport),
        }
    }

    /// Runs the dispatch loop until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!(conversation = %self.conversation_id, "chat controller running");

        loop {
            let flush_deadline = self.scheduler.deadline();
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("shutdown signal received, stopping chat controller");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("all chat handles dropped");
                        break;
                    }
                },
                _ = sleep_until_deadline(flush_deadline) => self.on_flush_deadline(),
                event = next_activity(&mut self.activity) => match event {
                    ActivityEvent::Stream(event) => self.on_stream_event(event),
                    ActivityEvent::Reply(result) => self.on_reply(result),
                    ActivityEvent::ReplayTick => self.on_replay_tick(),
                },
            }
        }

        if self.abandon_active(false) {
            self.publish();
        }
        info!(conversation = %self.conversation_id, "chat controller stopped");
    }

    fn handle_command(&mut self, command: ViewCommand) {
        match command {
            ViewCommand::Submit { text, options } => self.submit(&text, options),
            ViewCommand::Scrolled {
                distance_from_bottom,
            } => {
                let before = self.scroll.state();
                let after = self.scroll.handle(ScrollEvent::Scrolled {
                    distance_from_bottom,
                    streaming: self.state.is_streaming,
                });
                if before != after {
                    self.publish();
                }
            }
            ViewCommand::Stop => {
                if self.abandon_active(true) {
                    info!("response stopped by user");
                    self.publish();
                }
            }
            ViewCommand::Clear => {
                self.abandon_active(false);
                self.state.messages = Arc::new(Vec::new());
                self.state.error = None;
                self.scroll.handle(ScrollEvent::Cleared);
                info!(conversation = %self.conversation_id, "conversation cleared");
                self.publish();
            }
        }
    }

    fn submit(&mut self, text: &str, mut options: ChatOptions) {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring blank submission");
            return;
        }

        let route = match (self.stream.clone(), self.chat.clone()) {
            (_, Some(chat)) if options.persist_conversation => Route::Reply(chat),
            (Some(stream), _) => Route::Stream(stream),
            (None, Some(chat)) => Route::Reply(chat),
            (None, None) => {
                let err = DeliveryError::NoTransport;
                error!(error = %err, "cannot submit message");
                self.state.error = Some(err.user_message());
                self.publish();
                return;
            }
        };

        self.abandon_active(false);
        self.scroll.handle(ScrollEvent::SessionStarted);

        options.conversation_history = build_history(&self.state.messages);
        let persist = options.persist_conversation;
        let request = ChatRequest {
            conversation_id: self.conversation_id.clone(),
            text: text.to_string(),
            options,
        };

        self.state.error = None;
        self.state.is_loading = true;

        let user = Message::new(new_id(), Role::User, text);
        match route {
            Route::Stream(transport) => {
                let mut ids = self
                    .append(vec![user, Message::streaming_assistant(new_id())])
                    .into_iter();
                let user_id = ids.next().unwrap_or_default();
                let assistant_id = ids.next().unwrap_or_default();
                let session =
                    StreamingSession::new(assistant_id, user_id, request.clone(), &self.shutdown);
                let events = transport.subscribe(request, session.token());
                self.state.is_streaming = true;
                self.activity = Activity::Streaming { session, events };
            }
            Route::Reply(chat) => {
                let user_id = self.append(vec![user]).into_iter().next().unwrap_or_default();
                let session =
                    StreamingSession::new(new_id(), user_id, request.clone(), &self.shutdown);
                self.activity = Activity::Requesting {
                    session,
                    mode: RequestMode::Regular { persist },
                    reply: request_reply(chat, request),
                };
            }
        }
        self.publish();
    }

    fn on_stream_event(&mut self, event: Option<TransportEvent>) {
        let target = match &self.activity {
            Activity::Streaming { session, .. } if !session.is_cancelled() => {
                session.target_message_id().clone()
            }
            _ => return,
        };

        match event {
            Some(TransportEvent::Chunk(text)) => {
                debug!(message_id = %target, chars = text.chars().count(), "chunk received");
                self.scheduler.push(&target, &text, Instant::now());
            }
            Some(TransportEvent::Context(documents)) => {
                let flushed = self.flush_now();
                debug!(message_id = %target, documents = documents.len(), "context received");
                if let Some(message) = self.message_mut(&target) {
                    message.documents = documents;
                }
                self.publish();
                if flushed {
                    self.follow(ScrollBehavior::Auto);
                }
            }
            Some(TransportEvent::Complete) | None => self.complete_stream(),
            Some(TransportEvent::Error(err)) => self.on_stream_error(err),
        }
    }

    fn complete_stream(&mut self) {
        let Some(session) = std::mem::replace(&mut self.activity, Activity::Idle).into_session()
        else {
            return;
        };
        self.flush_now();
        self.scheduler.reset();
        self.finalize_message(session.target_message_id());
        self.state.is_streaming = false;
        self.state.is_loading = false;
        info!(session = session.seq(), message_id = %session.target_message_id(), "session completed");
        self.publish();
        self.follow(ScrollBehavior::Smooth);
    }

    fn on_stream_error(&mut self, err: DeliveryError) {
        self.scheduler.reset();
        let Some(session) = std::mem::replace(&mut self.activity, Activity::Idle).into_session()
        else {
            return;
        };

        let recoverable = classify(&err) == Recoverability::Recoverable;
        let chat = self
            .chat
            .clone()
            .filter(|_| self.config.fallback_enabled && recoverable);
        match chat {
            Some(chat) => {
                warn!(
                    session = session.seq(),
                    error = %err,
                    "stream failed, falling back to non-streaming request"
                );
                let reply = request_reply(chat, session.request().clone());
                self.activity = Activity::Requesting {
                    session,
                    mode: RequestMode::Fallback {
                        streaming_error: err,
                    },
                    reply,
                };
            }
            None => self.fail(session, err),
        }
    }

    fn on_reply(&mut self, result: Result<ChatResponse, DeliveryError>) {
        let Activity::Requesting { session, mode, .. } =
            std::mem::replace(&mut self.activity, Activity::Idle)
        else {
            return;
        };

        match (mode, result) {
            (RequestMode::Regular { persist }, Ok(response)) => {
                self.deliver_reply(session, response, persist)
            }
            (RequestMode::Regular { .. }, Err(err)) => self.fail(session, err),
            (RequestMode::Fallback { .. }, Ok(response)) => self.start_replay(session, response),
            (RequestMode::Fallback { streaming_error }, Err(err)) => {
                self.fail(session, fallback_failed(streaming_error, err))
            }
        }
    }

    fn deliver_reply(&mut self, session: StreamingSession, response: ChatResponse, persist: bool) {
        let mut message = Message::new(
            session.target_message_id().clone(),
            Role::Assistant,
            response.text(),
        );
        message.documents = response.documents.clone();
        message.similarity = response.similarity;
        message.persisted_id = response.assistant_message_id.clone();
        self.append(vec![message]);

        self.state.is_loading = false;
        info!(session = session.seq(), persist, "reply delivered");
        self.publish();
        self.follow(ScrollBehavior::Smooth);

        if persist {
            let context = PersistContext {
                should_persist: true,
                resolved_thread_id: session.request().options.thread_id.clone(),
                user_message_id: session.user_message_id().clone(),
            };
            notify_persistence(self.persistence.clone(), response, context);
        }
    }

    fn start_replay(&mut self, mut session: StreamingSession, response: ChatResponse) {
        let target = session.target_message_id().clone();
        let reused = match self.message_mut(&target) {
            Some(message) if message.is_streaming => {
                message.content.clear();
                message.documents = response.documents.clone();
                message.similarity = response.similarity;
                true
            }
            _ => false,
        };
        let target = if reused {
            target
        } else {
            let mut message = Message::streaming_assistant(new_id());
            message.documents = response.documents.clone();
            message.similarity = response.similarity;
            let id = self.append(vec![message]).into_iter().next().unwrap_or_default();
            session.retarget(id.clone());
            id
        };

        info!(
            session = session.seq(),
            message_id = %target,
            chars = response.text().chars().count(),
            "replaying fallback answer"
        );
        let replay = Replay::new(
            target,
            response,
            self.config.fallback_chunk_chars,
            self.config.fallback_interval(),
            Instant::now(),
        );
        self.state.is_streaming = true;
        self.activity = Activity::Replaying { session, replay };
        self.publish();
    }

    fn on_replay_tick(&mut self) {
        let now = Instant::now();
        let finished = match &mut self.activity {
            Activity::Replaying { session, replay } if session.accepts(replay.message_id()) => {
                if let Some(slice) = replay.next_slice(now) {
                    self.scheduler.push(replay.message_id(), &slice, now);
                }
                replay.is_finished()
            }
            _ => return,
        };
        if finished {
            self.finish_replay();
        }
    }

    fn finish_replay(&mut self) {
        let Activity::Replaying { session, replay } =
            std::mem::replace(&mut self.activity, Activity::Idle)
        else {
            return;
        };
        self.flush_now();
        self.scheduler.reset();

        let target = replay.message_id().clone();
        let response = replay.into_response();
        self.finalize_message(&target);
        self.state.is_streaming = false;
        self.state.is_loading = false;
        info!(session = session.seq(), message_id = %target, "fallback replay completed");
        self.publish();
        self.follow(ScrollBehavior::Smooth);

        let context = PersistContext {
            should_persist: false,
            resolved_thread_id: None,
            user_message_id: session.user_message_id().clone(),
        };
        notify_persistence(self.persistence.clone(), response, context);
    }

    fn fail(&mut self, session: StreamingSession, err: DeliveryError) {
        error!(session = session.seq(), error = %err, "session failed");
        session.cancel();
        self.scheduler.reset();

        let shown = err.user_message();
        let target = session.target_message_id();
        let messages = Arc::make_mut(&mut self.state.messages);
        if let Some(pos) = messages.iter().position(|m| m.id == *target) {
            if messages[pos].content.trim().is_empty() {
                messages.remove(pos);
            } else {
                let message = &mut messages[pos];
                message.is_streaming = false;
                message.timestamp = Utc::now();
                message.error = Some(shown.clone());
            }
        }

        self.state.error = Some(shown);
        self.state.is_streaming = false;
        self.state.is_loading = false;
        self.activity = Activity::Idle;
        self.publish();
    }

    fn on_flush_deadline(&mut self) {
        let Some(flush) = self.scheduler.take_due(Instant::now()) else {
            return;
        };
        let messages = Arc::make_mut(&mut self.state.messages).as_mut_slice();
        if apply_flush(messages, flush) == FlushOutcome::Applied {
            self.publish();
            self.follow(ScrollBehavior::Auto);
        }
    }

    /// Cancels the active session, if any, and finalizes its message.
    ///
    /// With `commit_pending` the buffered text is flushed first, otherwise it
    /// is dropped. Returns whether a session was active.
    fn abandon_active(&mut self, commit_pending: bool) -> bool {
        let Some(session) = std::mem::replace(&mut self.activity, Activity::Idle).into_session()
        else {
            return false;
        };
        if commit_pending {
            self.flush_now();
        }
        self.scheduler.reset();
        session.cancel();
        self.finalize_message(session.target_message_id());
        self.state.is_streaming = false;
        self.state.is_loading = false;
        true
    }

    /// Commits pending text immediately. Returns whether anything was applied.
    fn flush_now(&mut self) -> bool {
        match self.scheduler.force_flush() {
            Some(flush) => {
                apply_flush(Arc::make_mut(&mut self.state.messages).as_mut_slice(), flush)
                    == FlushOutcome::Applied
            }
            None => false,
        }
    }

    fn finalize_message(&mut self, id: &MessageId) {
        if let Some(message) = self.message_mut(id) {
            if message.is_streaming {
                message.is_streaming = false;
                message.timestamp = Utc::now();
            }
        }
    }

    fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        Arc::make_mut(&mut self.state.messages)
            .iter_mut()
            .find(|m| m.id == *id)
    }

    /// Appends through [`dedupe`] and returns the final ids of the new messages.
    fn append(&mut self, new: Vec<Message>) -> Vec<MessageId> {
        let messages = Arc::make_mut(&mut self.state.messages);
        let start = messages.len();
        let mut all = std::mem::take(messages);
        all.extend(new);
        *messages = dedupe(all);
        messages[start..].iter().map(|m| m.id.clone()).collect()
    }

    fn follow(&mut self, behavior: ScrollBehavior) {
        let before = self.scroll.state();
        self.scroll.follow(&mut *self.viewport, behavior);
        let after = self.scroll.state();
        if before != after {
            self.snapshots.send_modify(|s| s.auto_follow = after);
        }
    }

    fn publish(&mut self) {
        self.state.revision += 1;
        let snapshot = ConversationSnapshot {
            messages: Arc::clone(&self.state.messages),
            is_streaming: self.state.is_streaming,
            is_loading: self.state.is_loading,
            error: self.state.error.clone(),
            auto_follow: self.scroll.state(),
            revision: self.state.revision,
        };
        self.snapshots.send_replace(snapshot);
    }
}
