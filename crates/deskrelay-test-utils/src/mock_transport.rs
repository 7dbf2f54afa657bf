// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock realtime transport for deterministic testing.
//!
//! `MockTransport` implements `Transport` with scripted dial failures, scripted
//! acknowledgements, captured emits, and injectable inbound events.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Mutex, Notify, mpsc};

use deskrelay_core::traits::{Connection, Dialed, Transport};
use deskrelay_core::{DeskRelayError, InboundEvent};

/// How a mock connection answers an acknowledged emit.
#[derive(Debug, Clone)]
pub enum AckReply {
    /// Reply with this payload.
    Value(Value),
    /// Never reply; the caller's timeout decides.
    Never,
}

#[derive(Default)]
struct Script {
    dial_failures: VecDeque<DeskRelayError>,
    acks: HashMap<String, VecDeque<AckReply>>,
}

/// Everything emitted over any mock connection, in order.
#[derive(Default)]
struct Outbox {
    emitted: Mutex<Vec<(String, Value)>>,
    notify: Notify,
}

/// A mock realtime transport.
///
/// Each successful `dial()` creates a fresh [`MockConnection`]; the most recent
/// one receives injected events.
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    outbox: Arc<Outbox>,
    unreachable: AtomicBool,
    held: AtomicBool,
    release: Notify,
    dials: AtomicU32,
    tokens: Mutex<Vec<String>>,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            outbox: Arc::new(Outbox::default()),
            unreachable: AtomicBool::new(false),
            held: AtomicBool::new(false),
            release: Notify::new(),
            dials: AtomicU32::new(0),
            tokens: Mutex::new(Vec::new()),
            connections: Mutex::new(Vec::new()),
        }
    }

    /// The next `n` dials fail with a transient transport error.
    pub async fn fail_next_dials(&self, n: usize) {
        let mut script = self.script.lock().await;
        for _ in 0..n {
            script
                .dial_failures
                .push_back(DeskRelayError::transport("connection refused"));
        }
    }

    /// The next dial fails with a non-transient rejection.
    pub async fn reject_next_dial(&self, reason: &str) {
        self.script
            .lock()
            .await
            .dial_failures
            .push_back(DeskRelayError::Rejected(reason.to_string()));
    }

    /// While set, every dial fails with a transient error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// While set, dials are counted and then parked until released.
    pub fn hold_dials(&self, held: bool) {
        self.held.store(held, Ordering::SeqCst);
        if !held {
            self.release.notify_waiters();
        }
    }

    /// Queue the reply for the next acknowledged emit of `event`.
    ///
    /// Unscripted acknowledged emits are answered with `{}`.
    pub async fn push_ack(&self, event: &str, reply: AckReply) {
        self.script
            .lock()
            .await
            .acks
            .entry(event.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Number of dial attempts so far, successful or not.
    pub fn dial_count(&self) -> u32 {
        self.dials.load(Ordering::SeqCst)
    }

    /// Tokens presented on each dial, in order.
    pub async fn tokens(&self) -> Vec<String> {
        self.tokens.lock().await.clone()
    }

    /// Every connection produced so far, oldest first.
    pub async fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().await.clone()
    }

    /// Deliver an inbound event on the most recent open connection.
    ///
    /// Returns `false` if there is no open connection.
    pub async fn inject(&self, event: &str, payload: Value) -> bool {
        let Some(conn) = self.connections.lock().await.last().cloned() else {
            return false;
        };
        conn.deliver(InboundEvent::new(event, payload)).await
    }

    /// Simulate the server dropping the most recent connection.
    pub async fn drop_connection(&self) {
        if let Some(conn) = self.connections.lock().await.last().cloned() {
            conn.shut();
        }
    }

    /// All emits so far, across connections.
    pub async fn emitted(&self) -> Vec<(String, Value)> {
        self.outbox.emitted.lock().await.clone()
    }

    /// Payloads of every emit named `event`.
    pub async fn emitted_named(&self, event: &str) -> Vec<Value> {
        self.outbox
            .emitted
            .lock()
            .await
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Wait until at least `count` emits named `event` have been captured.
    pub async fn wait_for_emits(&self, event: &str, count: usize) -> Vec<Value> {
        loop {
            let notified = self.outbox.notify.notified();
            let seen = self.emitted_named(event).await;
            if seen.len() >= count {
                return seen;
            }
            notified.await;
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    async fn dial(&self, auth_token: &str) -> Result<Dialed, DeskRelayError> {
        let n = self.dials.fetch_add(1, Ordering::SeqCst) + 1;
        self.tokens.lock().await.push(auth_token.to_string());

        loop {
            let released = self.release.notified();
            if !self.held.load(Ordering::SeqCst) {
                break;
            }
            released.await;
        }

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(DeskRelayError::transport("network unreachable"));
        }
        if let Some(err) = self.script.lock().await.dial_failures.pop_front() {
            return Err(err);
        }

        let (tx, rx) = mpsc::channel(64);
        let conn = Arc::new(MockConnection {
            socket_id: format!("mock-socket-{n}"),
            open: AtomicBool::new(true),
            inbound: std::sync::Mutex::new(Some(tx)),
            script: Arc::clone(&self.script),
            outbox: Arc::clone(&self.outbox),
        });
        self.connections.lock().await.push(Arc::clone(&conn));

        Ok(Dialed {
            connection: conn,
            events: rx,
        })
    }
}

/// One mock connection produced by [`MockTransport::dial`].
pub struct MockConnection {
    socket_id: String,
    open: AtomicBool,
    inbound: std::sync::Mutex<Option<mpsc::Sender<InboundEvent>>>,
    script: Arc<Mutex<Script>>,
    outbox: Arc<Outbox>,
}

impl MockConnection {
    async fn deliver(&self, event: InboundEvent) -> bool {
        let sender = self
            .inbound
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().cloned());
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Mark closed and end the inbound stream.
    fn shut(&self) {
        self.open.store(false, Ordering::SeqCst);
        if let Ok(mut guard) = self.inbound.lock() {
            guard.take();
        }
    }

    async fn record(&self, event: &str, payload: Value) -> Result<(), DeskRelayError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(DeskRelayError::transport("socket closed"));
        }
        self.outbox
            .emitted
            .lock()
            .await
            .push((event.to_string(), payload));
        self.outbox.notify.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn socket_id(&self) -> &str {
        &self.socket_id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn emit(&self, event: &str, payload: Value) -> Result<(), DeskRelayError> {
        self.record(event, payload).await
    }

    async fn emit_with_ack(&self, event: &str, payload: Value) -> Result<Value, DeskRelayError> {
        self.record(event, payload).await?;
        let reply = self
            .script
            .lock()
            .await
            .acks
            .get_mut(event)
            .and_then(VecDeque::pop_front);
        match reply {
            Some(AckReply::Value(value)) => Ok(value),
            Some(AckReply::Never) => std::future::pending().await,
            None => Ok(json!({})),
        }
    }

    async fn close(&self) {
        self.shut();
    }
}
