// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime transport traits (bidirectional, multiplexed event channel).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::DeskRelayError;
use crate::types::InboundEvent;

/// A freshly dialed connection and the stream of events it delivers.
///
/// The receiver ends when the underlying socket closes.
pub struct Dialed {
    pub connection: Arc<dyn Connection>,
    pub events: mpsc::Receiver<InboundEvent>,
}

/// Factory for live connections to the realtime server.
///
/// A transport performs exactly one dial per call; retry policy belongs to
/// the connection manager.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Returns the human-readable name of this transport.
    fn name(&self) -> &str;

    /// Opens and authenticates one connection.
    async fn dial(&self, auth_token: &str) -> Result<Dialed, DeskRelayError>;
}

/// A single live realtime connection.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Server-assigned socket identifier.
    fn socket_id(&self) -> &str;

    /// Whether the socket is still open.
    fn is_open(&self) -> bool;

    /// Emits an event without waiting for an acknowledgement.
    async fn emit(&self, event: &str, payload: Value) -> Result<(), DeskRelayError>;

    /// Emits an event and waits for the server's acknowledgement payload.
    async fn emit_with_ack(&self, event: &str, payload: Value) -> Result<Value, DeskRelayError>;

    /// Closes the socket. Idempotent.
    async fn close(&self);
}
