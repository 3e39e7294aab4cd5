// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits consumed by the delivery pipeline.
//!
//! Backends, persistence, and the on-screen viewport are implemented
//! elsewhere; the pipeline only sees them through these seams.

pub mod persistence;
pub mod transport;
pub mod viewport;

pub use persistence::PersistenceHook;
pub use transport::{
    ChatTransport, DocumentLister, EventStream, StreamTransport, TransportEvent,
};
pub use viewport::Viewport;
