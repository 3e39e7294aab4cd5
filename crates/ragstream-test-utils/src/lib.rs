// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for ragstream integration tests.
//!
//! Provides mock collaborators and a harness for fast, deterministic tests
//! without a running backend.
//!
//! # Components
//!
//! - [`ScriptedStreamTransport`] - Streaming transport replaying preset or live-driven events
//! - [`MockChatTransport`] - Single-shot transport with queued replies
//! - [`RecordingViewport`] / [`RecordingPersistence`] - Capture scroll and persistence calls
//! - [`TestHarness`] - A spawned controller wired to all of the above

pub mod harness;
pub mod mock_chat;
pub mod mock_stream;
pub mod recording;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_chat::{MockChatTransport, answer};
pub use mock_stream::{Script, ScriptedStreamTransport, StreamDriver};
pub use recording::{RecordingPersistence, RecordingViewport};
