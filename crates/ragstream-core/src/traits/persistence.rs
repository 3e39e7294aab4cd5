// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hook invoked when a finished exchange may be durably recorded.

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::types::{ChatResponse, PersistContext};

/// Receives the result of a finished chat exchange.
///
/// Called once per completed non-streaming exchange, and with
/// `should_persist = false` after a fallback replay.
#[async_trait]
pub trait PersistenceHook: Send + Sync {
    async fn handle_chat_result(
        &self,
        response: &ChatResponse,
        context: PersistContext,
    ) -> Result<(), DeliveryError>;
}
