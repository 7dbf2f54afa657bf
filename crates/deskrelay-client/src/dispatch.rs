// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes connection events to the engine and the aggregator.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use deskrelay_core::{Alert, InboundEvent, NotificationType, TransportEvent, events};
use deskrelay_notify::parse_status_change;

use crate::client::Components;

pub(crate) async fn run(
    parts: Arc<Components>,
    mut events: broadcast::Receiver<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => handle(&parts, event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "dispatcher lagged, inbound events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!("dispatcher stopped");
}

async fn handle(parts: &Arc<Components>, event: TransportEvent) {
    match event {
        TransportEvent::Connected { socket_id } => {
            info!(socket_id = %socket_id, "connected, fetching notification backlog");
            parts.rooms.rejoin(&socket_id).await;
            let aggregator = Arc::clone(&parts.aggregator);
            tokio::spawn(async move {
                // Failure is logged by the aggregator; the next connect retries.
                let _ = aggregator.fetch_backlog().await;
            });
        }
        TransportEvent::Disconnected { reason } => debug!(reason = %reason, "disconnected"),
        TransportEvent::Inbound(event) => inbound(parts, event).await,
    }
}

async fn inbound(parts: &Components, event: InboundEvent) {
    let InboundEvent { name, payload } = event;
    match name.as_str() {
        events::MESSAGE_RECEIVED => {
            if let Err(e) = parts.engine.receive(&payload).await {
                warn!(error = %e, "dropping inbound message");
            }
        }
        events::STATUS_UPDATE | events::ISSUE_STATUS_CHANGED => {
            let change = match parse_status_change(&payload) {
                Ok(change) => change,
                Err(e) => {
                    warn!(event = %name, error = %e, "dropping status change");
                    return;
                }
            };
            let viewing = parts.rooms.is_viewing(&change.issue_id).await;
            if let Some(notification) = parts.aggregator.on_status_changed(&change, viewing).await {
                let _ = parts.status_tx.send(notification);
            }
        }
        events::REPORT_STATUS_UPDATE => match parse_status_change(&payload) {
            Ok(change) => {
                parts.aggregator.on_room_status_update(&change);
            }
            Err(e) => warn!(event = %name, error = %e, "dropping room status update"),
        },
        events::STORED_NOTIFICATIONS => {
            parts.aggregator.merge_stored(&payload).await;
        }
        events::ERROR => {
            let text = server_error_text(&payload);
            warn!(error = %text, "server reported an error");
            parts
                .aggregator
                .alert(Alert::new(NotificationType::Error, format!("Server error: {text}")));
        }
        other if other.starts_with(events::FETCH_MESSAGES_RESPONSE_PREFIX) => {}
        other => debug!(event = %other, "unhandled event"),
    }
}

fn server_error_text(payload: &Value) -> String {
    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}
