// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle of the single realtime connection.
//!
//! The manager dials through a [`Transport`], announces the session identity,
//! forwards inbound events to every subscriber and reconnects with a bounded,
//! fixed-delay policy when the socket drops. After the policy is exhausted it
//! stays disconnected until the next [`ConnectionManager::connect`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use deskrelay_core::events;
use deskrelay_core::traits::{Connection, Dialed, Transport};
use deskrelay_core::{ConnectionState, DeskRelayError, InboundEvent, Session, TransportEvent};

/// Bounded reconnection policy: `max_attempts` retries after the initial
/// attempt, `delay` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

struct Shared {
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<TransportEvent>,
    current: RwLock<Option<Arc<dyn Connection>>>,
}

/// Owns the realtime connection for one process.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    link: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, policy: ReconnectPolicy, event_buffer: usize) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, _) = broadcast::channel(event_buffer.max(1));
        Self {
            shared: Arc::new(Shared {
                transport,
                policy,
                state_tx,
                events_tx,
                current: RwLock::new(None),
            }),
            link: Mutex::new(None),
        }
    }

    /// Establish the connection for `session`, replacing any prior one.
    ///
    /// Without a token nothing is dialed and realtime features stay inert.
    /// Failures are logged, never returned: the resulting state tells the
    /// caller whether the connection came up.
    pub async fn connect(&self, session: &Session, token: Option<&str>) -> ConnectionState {
        let mut link = self.link.lock().await;
        self.teardown(&mut link).await;

        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            warn!(user_id = %session.id, "no auth token, realtime connection not started");
            return ConnectionState::Disconnected;
        };

        info!(
            user_id = %session.id,
            role = %session.role,
            transport = self.shared.transport.name(),
            "connecting"
        );
        if let Some(events) = establish(&self.shared, session, token).await {
            *link = Some(tokio::spawn(run_link(
                Arc::clone(&self.shared),
                session.clone(),
                token.to_string(),
                events,
            )));
        }
        self.state()
    }

    /// Tear down the active connection. Idempotent.
    pub async fn disconnect(&self) {
        let mut link = self.link.lock().await;
        self.teardown(&mut link).await;
    }

    async fn teardown(&self, link: &mut Option<JoinHandle<()>>) {
        if let Some(handle) = link.take() {
            handle.abort();
            // The link may be mid-reconnect on another worker; it must not
            // publish a connection after this point.
            let _ = handle.await;
        }
        if let Some(conn) = self.shared.current.write().await.take() {
            conn.close().await;
            info!(socket_id = %conn.socket_id(), "disconnected");
            let _ = self.shared.events_tx.send(TransportEvent::Disconnected {
                reason: "closed by client".to_string(),
            });
        }
        self.shared.state_tx.send_replace(ConnectionState::Disconnected);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Subscribe to lifecycle changes and inbound events.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.shared.events_tx.subscribe()
    }

    /// The live connection, if any.
    pub async fn current(&self) -> Option<Arc<dyn Connection>> {
        self.shared
            .current
            .read()
            .await
            .as_ref()
            .filter(|c| c.is_open())
            .cloned()
    }

    pub async fn emit(&self, event: &str, payload: Value) -> Result<(), DeskRelayError> {
        let conn = self.current().await.ok_or(DeskRelayError::NotConnected)?;
        conn.emit(event, payload).await
    }

    pub async fn emit_with_ack(&self, event: &str, payload: Value) -> Result<Value, DeskRelayError> {
        let conn = self.current().await.ok_or(DeskRelayError::NotConnected)?;
        conn.emit_with_ack(event, payload).await
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.link.get_mut().take() {
            handle.abort();
        }
    }
}

/// Dial with the reconnect policy. Returns the inbound stream on success.
async fn establish(
    shared: &Shared,
    session: &Session,
    token: &str,
) -> Option<mpsc::Receiver<InboundEvent>> {
    let policy = shared.policy;
    for attempt in 0..=policy.max_attempts {
        if attempt > 0 {
            tokio::time::sleep(policy.delay).await;
        }
        shared
            .state_tx
            .send_replace(ConnectionState::Connecting { attempt });

        let Dialed { connection, events } = match shared.transport.dial(token).await {
            Ok(dialed) => dialed,
            Err(e) if e.is_transient() => {
                warn!(attempt, error = %e, "connect attempt failed");
                continue;
            }
            Err(e) => {
                error!(error = %e, "connection refused, not retrying");
                break;
            }
        };

        let announce = json!({ "userId": session.id, "role": session.role.to_string() });
        if let Err(e) = connection.emit(events::USER_CONNECTED, announce).await {
            warn!(attempt, error = %e, "identity announcement failed");
            connection.close().await;
            continue;
        }

        let socket_id = connection.socket_id().to_string();
        *shared.current.write().await = Some(connection);
        shared.state_tx.send_replace(ConnectionState::Connected {
            socket_id: socket_id.clone(),
        });
        let _ = shared.events_tx.send(TransportEvent::Connected {
            socket_id: socket_id.clone(),
        });
        info!(socket_id = %socket_id, attempt, "connected");
        return Some(events);
    }

    error!(
        attempts = policy.max_attempts + 1,
        "giving up on realtime connection"
    );
    shared.state_tx.send_replace(ConnectionState::Disconnected);
    None
}

/// Forward inbound events until the socket drops, then reconnect.
async fn run_link(
    shared: Arc<Shared>,
    session: Session,
    token: String,
    mut events: mpsc::Receiver<InboundEvent>,
) {
    loop {
        while let Some(event) = events.recv().await {
            debug!(event = %event.name, "inbound");
            let _ = shared.events_tx.send(TransportEvent::Inbound(event));
        }

        shared.current.write().await.take();
        shared.state_tx.send_replace(ConnectionState::Disconnected);
        let _ = shared.events_tx.send(TransportEvent::Disconnected {
            reason: "connection lost".to_string(),
        });
        warn!(user_id = %session.id, "connection lost, reconnecting");

        match establish(&shared, &session, &token).await {
            Some(next) => events = next,
            None => return,
        }
    }
}
