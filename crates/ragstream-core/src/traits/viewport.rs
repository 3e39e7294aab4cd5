// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The scrollable message viewport owned by the UI layer.

use crate::types::ScrollBehavior;

/// Scroll position queries and commands for the message list.
pub trait Viewport: Send {
    /// Pixels between the visible bottom edge and the end of the content.
    fn distance_from_bottom(&self) -> f64;

    /// Scrolls to the end of the content.
    fn scroll_to_bottom(&mut self, behavior: ScrollBehavior);
}
