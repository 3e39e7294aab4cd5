// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ragstream documents`: one page of the conversation's document listing.

use std::io::{self, Write};

use clap::Args;
use colored::Colorize;
use ragstream_client::RagClient;
use ragstream_config::RagstreamConfig;
use ragstream_core::{DeliveryError, DocumentLister, DocumentPage};

use crate::chat::conversation_id;

#[derive(Args, Debug)]
pub struct DocumentsArgs {
    /// Conversation (project) whose documents to list.
    #[arg(long)]
    pub conversation: Option<String>,

    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1)]
    pub page: u32,
}

pub async fn run(config: &RagstreamConfig, args: DocumentsArgs) -> Result<(), DeliveryError> {
    let conversation = conversation_id(args.conversation.as_deref(), config)?;
    let client = RagClient::new(&config.backend)?;
    let page = client
        .list_documents(&conversation, args.page, config.chat.page_size)
        .await?;

    write_page(&mut io::stdout(), &page, args.page)
        .map_err(|e| DeliveryError::Internal(format!("failed to write to stdout: {e}")))
}

fn write_page(out: &mut impl Write, page: &DocumentPage, number: u32) -> io::Result<()> {
    if page.documents.is_empty() {
        writeln!(out, "{}", "no documents".dimmed())?;
        return Ok(());
    }
    for doc in &page.documents {
        writeln!(
            out,
            "{:<40} {:<12} {:>6}",
            doc.file_name.as_deref().unwrap_or("(unnamed)"),
            doc.analysis_status.as_deref().unwrap_or("-"),
            doc.total_chunks
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".into()),
        )?;
    }
    writeln!(out, "page {number}, {} documents in total", page.total)
}
