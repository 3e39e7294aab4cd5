// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the ragstream delivery pipeline.

use strum::Display;
use thiserror::Error;

/// Low-level failure classes reported by a streaming transport.
///
/// All of these are eligible for the non-streaming fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TransportErrorKind {
    /// The connection was reset or closed before the response finished.
    ConnectionReset,
    /// The environment or server cannot deliver a chunked/streamed body.
    UnsupportedStreaming,
    /// Any other network or I/O level failure.
    Io,
}

/// The primary error type used across the delivery pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Transport-level failure (connection reset, unsupported streaming, I/O).
    #[error("transport error ({kind}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The remote service rejected the request with a semantic error.
    #[error("application error: {message}")]
    Application {
        status: Option<u16>,
        message: String,
    },

    /// Streaming failed and the non-streaming retry failed too.
    #[error("streaming failed ({streaming}) and fallback request failed ({fallback})")]
    FallbackFailed {
        streaming: Box<DeliveryError>,
        fallback: Box<DeliveryError>,
    },

    /// Neither a streaming nor a non-streaming transport is configured.
    #[error("no chat transport configured")]
    NoTransport,

    /// Configuration errors surfaced at runtime.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DeliveryError {
    /// Convenience constructor for a transport error without a source.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        DeliveryError::Transport {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Convenience constructor for an application error.
    pub fn application(status: Option<u16>, message: impl Into<String>) -> Self {
        DeliveryError::Application {
            status,
            message: message.into(),
        }
    }

    /// Returns the transport failure class, if this is a transport error.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            DeliveryError::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            DeliveryError::Application { message, .. } => message.clone(),
            DeliveryError::FallbackFailed { fallback, .. } => fallback.user_message(),
            other => other.to_string(),
        }
    }
}
