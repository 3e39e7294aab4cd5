// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP and SSE client for the ragstream chat backend.
//!
//! [`RagClient`] implements [`ChatTransport`](ragstream_core::ChatTransport),
//! [`StreamTransport`](ragstream_core::StreamTransport), and
//! [`DocumentLister`](ragstream_core::DocumentLister) against the backend's
//! `/api/rag/*` endpoints.

pub mod client;
pub mod sse;
pub mod types;

pub use client::RagClient;
