// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Deskrelay messaging core.

use thiserror::Error;

/// The primary error type used across all Deskrelay components and adapters.
#[derive(Debug, Error)]
pub enum DeskRelayError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Realtime transport errors (handshake failure, socket closed, bad frame).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An operation needed a live connection and none was available.
    #[error("not connected to the realtime server")]
    NotConnected,

    /// REST collaborator errors (HTTP failure, unexpected status, bad body).
    #[error("service error: {message}")]
    Service {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Attachment upload failed.
    #[error("upload failed: {message}")]
    Upload {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server acknowledged an emit with an error.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// An inbound payload could not be interpreted.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Caller supplied input that cannot be acted on.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DeskRelayError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        DeskRelayError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a service error without an underlying source.
    pub fn service(message: impl Into<String>) -> Self {
        DeskRelayError::Service {
            message: message.into(),
            source: None,
        }
    }

    /// Whether the failure is worth another connection attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DeskRelayError::Transport { .. }
                | DeskRelayError::Timeout { .. }
                | DeskRelayError::NotConnected
        )
    }
}
