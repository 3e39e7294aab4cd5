// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording collaborators: a viewport and a persistence hook that capture
//! every call for later assertions.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ragstream_core::{
    ChatResponse, DeliveryError, PersistContext, PersistenceHook, ScrollBehavior, Viewport,
};
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Default)]
struct ViewportState {
    distance: f64,
    scrolls: Vec<ScrollBehavior>,
}

/// A [`Viewport`] whose distance from the bottom is set by the test.
///
/// Clones share state, so a test can keep one clone while the controller
/// owns another. Scrolling to the bottom sets the distance to zero.
#[derive(Debug, Clone, Default)]
pub struct RecordingViewport {
    state: Arc<Mutex<ViewportState>>,
}

impl RecordingViewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_distance(&self, distance: f64) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .distance = distance;
    }

    /// Scroll requests received so far, in order.
    pub fn scrolls(&self) -> Vec<ScrollBehavior> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .scrolls
            .clone()
    }
}

impl Viewport for RecordingViewport {
    fn distance_from_bottom(&self) -> f64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .distance
    }

    fn scroll_to_bottom(&mut self, behavior: ScrollBehavior) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.scrolls.push(behavior);
        state.distance = 0.0;
    }
}

/// A [`PersistenceHook`] that records every finished exchange.
#[derive(Default)]
pub struct RecordingPersistence {
    calls: AsyncMutex<Vec<(ChatResponse, PersistContext)>>,
    fail_with: Option<String>,
    latency: Option<Duration>,
}

impl RecordingPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hook that records calls and then reports `message` as an error.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Delays every call by `latency` after recording it.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn calls(&self) -> Vec<(ChatResponse, PersistContext)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl PersistenceHook for RecordingPersistence {
    async fn handle_chat_result(
        &self,
        response: &ChatResponse,
        context: PersistContext,
    ) -> Result<(), DeliveryError> {
        self.calls.lock().await.push((response.clone(), context));
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.fail_with {
            Some(message) => Err(DeliveryError::Internal(message.clone())),
            None => Ok(()),
        }
    }
}
