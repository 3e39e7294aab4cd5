// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auto-follow state machine for the message viewport.
//!
//! Leaving the bottom is easy: any scroll more than the threshold away from
//! the bottom detaches, even mid-stream. Coming back is strict: only an
//! exact-bottom scroll while nothing is streaming re-attaches. Starting a new
//! session or clearing the conversation always re-attaches.

use ragstream_config::DeliveryConfig;
use ragstream_core::{ScrollBehavior, Viewport};
use strum::Display;
use tracing::debug;

/// Whether new content should pull the viewport to the bottom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AutoFollow {
    #[default]
    Following,
    Detached,
}

/// Inputs to the auto-follow state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollEvent {
    /// The user scrolled; `streaming` tells whether a response is in flight.
    Scrolled {
        distance_from_bottom: f64,
        streaming: bool,
    },
    SessionStarted,
    Cleared,
}

/// Distances that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPolicy {
    pub threshold_px: f64,
    pub bottom_tolerance_px: f64,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            threshold_px: 80.0,
            bottom_tolerance_px: 1.0,
        }
    }
}

impl From<&DeliveryConfig> for ScrollPolicy {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            threshold_px: config.scroll_threshold_px,
            bottom_tolerance_px: config.bottom_tolerance_px,
        }
    }
}

impl ScrollPolicy {
    pub fn is_near_bottom(&self, distance_from_bottom: f64) -> bool {
        distance_from_bottom <= self.threshold_px
    }

    pub fn is_at_bottom(&self, distance_from_bottom: f64) -> bool {
        distance_from_bottom <= self.bottom_tolerance_px
    }

    /// The pure transition function.
    pub fn transition(&self, state: AutoFollow, event: ScrollEvent) -> AutoFollow {
        match (state, event) {
            (_, ScrollEvent::SessionStarted | ScrollEvent::Cleared) => AutoFollow::Following,
            (
                AutoFollow::Following,
                ScrollEvent::Scrolled {
                    distance_from_bottom,
                    ..
                },
            ) if !self.is_near_bottom(distance_from_bottom) => AutoFollow::Detached,
            (
                AutoFollow::Detached,
                ScrollEvent::Scrolled {
                    distance_from_bottom,
                    streaming: false,
                },
            ) if self.is_at_bottom(distance_from_bottom) => AutoFollow::Following,
            (state, ScrollEvent::Scrolled { .. }) => state,
        }
    }
}

/// Holds the auto-follow state and applies it to a [`Viewport`].
#[derive(Debug, Clone, Default)]
pub struct ScrollCoordinator {
    policy: ScrollPolicy,
    state: AutoFollow,
}

impl ScrollCoordinator {
    pub fn new(policy: ScrollPolicy) -> Self {
        Self {
            policy,
            state: AutoFollow::Following,
        }
    }

    pub fn state(&self) -> AutoFollow {
        self.state
    }

    pub fn handle(&mut self, event: ScrollEvent) -> AutoFollow {
        let next = self.policy.transition(self.state, event);
        if next != self.state {
            debug!(from = %self.state, to = %next, ?event, "auto-follow changed");
        }
        self.state = next;
        next
    }

    /// Best-effort scroll after new content was committed.
    ///
    /// Does nothing while detached. If the viewport has drifted beyond the
    /// threshold since the last scroll event, detaches instead of scrolling.
    /// Returns whether a scroll was issued.
    pub fn follow(&mut self, viewport: &mut dyn Viewport, behavior: ScrollBehavior) -> bool {
        if self.state != AutoFollow::Following {
            return false;
        }
        let distance = viewport.distance_from_bottom();
        if !self.policy.is_near_bottom(distance) {
            debug!(distance, "viewport drifted away, detaching instead of scrolling");
            self.state = AutoFollow::Detached;
            return false;
        }
        viewport.scroll_to_bottom(behavior);
        true
    }
}
