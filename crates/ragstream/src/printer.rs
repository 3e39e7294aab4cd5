// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Renders conversation snapshots as an append-only terminal stream.

use std::io::{self, Write};

use ragstream_core::{Message, MessageId, Role};
use ragstream_delivery::ConversationSnapshot;

/// Writes the growing assistant answer, printing only what is new.
///
/// When the answer is rewritten rather than extended (a fallback replay
/// restarting the text, or a different message taking over), the printer
/// starts a fresh line and prints the new text from the beginning.
pub struct StreamPrinter<W: Write> {
    out: W,
    message_id: Option<MessageId>,
    printed: String,
}

impl<W: Write> StreamPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            message_id: None,
            printed: String::new(),
        }
    }

    /// Prints the part of the latest answer not yet written.
    ///
    /// Only assistant messages after the last user message are considered.
    pub fn render(&mut self, snapshot: &ConversationSnapshot) -> io::Result<()> {
        let Some(answer) = current_answer(&snapshot.messages) else {
            return Ok(());
        };

        let same_message = self.message_id.as_ref() == Some(&answer.id);
        if same_message && answer.content.starts_with(&self.printed) {
            let fresh = &answer.content[self.printed.len()..];
            if !fresh.is_empty() {
                self.out.write_all(fresh.as_bytes())?;
                self.printed.push_str(fresh);
            }
        } else {
            if !self.printed.is_empty() {
                writeln!(self.out)?;
            }
            self.out.write_all(answer.content.as_bytes())?;
            self.message_id = Some(answer.id.clone());
            self.printed = answer.content.clone();
        }
        self.out.flush()
    }

    /// Ends the current line, if anything was printed.
    pub fn finish(&mut self) -> io::Result<()> {
        if !self.printed.is_empty() {
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn current_answer(messages: &[Message]) -> Option<&Message> {
    let last_user = messages.iter().rposition(|m| m.role == Role::User)?;
    messages[last_user + 1..]
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
}
