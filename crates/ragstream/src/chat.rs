// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ragstream chat`: one question, streamed answer.
//!
//! Spawns a [`ChatController`] wired to the HTTP client, submits the
//! question, and prints snapshots until the session goes idle. Ctrl-C stops
//! the response, keeping what has arrived.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;
use colored::Colorize;
use ragstream_client::RagClient;
use ragstream_config::RagstreamConfig;
use ragstream_core::{ChatResponse, DeliveryError, PersistContext, PersistenceHook};
use ragstream_delivery::{ChatController, ChatHandle, options_from_config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::printer::StreamPrinter;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// The question to ask.
    pub text: String,

    /// Conversation (project) to ask in. Overrides `chat.conversation_id`.
    #[arg(long)]
    pub conversation: Option<String>,

    /// Ask the backend to store this exchange.
    #[arg(long)]
    pub persist: bool,

    /// Thread to store the exchange under. Only used with `--persist`.
    #[arg(long)]
    pub thread: Option<String>,

    /// Answer without document retrieval.
    #[arg(long)]
    pub no_rag: bool,
}

/// Logs finished exchanges; the backend stores persisted ones itself.
struct LoggingHook;

#[async_trait]
impl PersistenceHook for LoggingHook {
    async fn handle_chat_result(
        &self,
        response: &ChatResponse,
        context: PersistContext,
    ) -> Result<(), DeliveryError> {
        info!(
            should_persist = context.should_persist,
            thread_id = context.resolved_thread_id.as_deref().unwrap_or("-"),
            user_message_id = %context.user_message_id,
            assistant_message_id = response.assistant_message_id.as_deref().unwrap_or("-"),
            "exchange finished"
        );
        Ok(())
    }
}

/// Resolves the conversation id from the flag or the config.
pub fn conversation_id(
    flag: Option<&str>,
    config: &RagstreamConfig,
) -> Result<String, DeliveryError> {
    flag.or(config.chat.conversation_id.as_deref())
        .map(str::to_string)
        .ok_or_else(|| {
            DeliveryError::Config(
                "no conversation selected: pass --conversation or set chat.conversation_id".into(),
            )
        })
}

pub async fn run(config: &RagstreamConfig, args: ChatArgs) -> Result<(), DeliveryError> {
    let conversation = conversation_id(args.conversation.as_deref(), config)?;
    let client = Arc::new(RagClient::new(&config.backend)?);

    let mut options = options_from_config(&config.chat);
    options.persist_conversation |= args.persist;
    options.use_rag_search &= !args.no_rag;
    options.thread_id = args.thread;

    let shutdown = CancellationToken::new();
    let (handle, task) = ChatController::builder(conversation)
        .config(config.delivery.clone())
        .stream_transport(client.clone())
        .chat_transport(client)
        .persistence(Arc::new(LoggingHook))
        .spawn(shutdown.clone());

    let result = stream_answer(&handle, &args.text, options).await;
    shutdown.cancel();
    let _ = task.await;
    result
}

async fn stream_answer(
    handle: &ChatHandle,
    text: &str,
    options: ragstream_core::ChatOptions,
) -> Result<(), DeliveryError> {
    let mut snapshots = handle.subscribe();
    let start = snapshots.borrow_and_update().revision;
    handle.submit(text, options).await?;

    let mut printer = StreamPrinter::new(std::io::stdout());
    let mut stopping = false;
    let last = loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Err(DeliveryError::Internal("chat controller stopped".into()));
                }
                let snapshot = snapshots.borrow_and_update().clone();
                printer.render(&snapshot).map_err(stdout_error)?;
                if snapshot.revision > start && snapshot.is_idle() {
                    break snapshot;
                }
            }
            _ = tokio::signal::ctrl_c(), if !stopping => {
                debug!("interrupt received, stopping response");
                stopping = true;
                handle.stop().await?;
            }
        }
    };
    printer.finish().map_err(stdout_error)?;

    if let Some(error) = last.error {
        return Err(DeliveryError::application(None, error));
    }
    if let Some(answer) = last.last_assistant() {
        for doc in &answer.documents {
            let name = doc.file_name.as_deref().unwrap_or("(unnamed)");
            match doc.similarity {
                Some(similarity) => {
                    eprintln!("{} {name} ({similarity:.2})", "source:".dimmed())
                }
                None => eprintln!("{} {name}", "source:".dimmed()),
            }
        }
    }
    Ok(())
}

fn stdout_error(e: std::io::Error) -> DeliveryError {
    DeliveryError::Internal(format!("failed to write to stdout: {e}"))
}
