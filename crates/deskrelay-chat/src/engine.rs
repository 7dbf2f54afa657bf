// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-ticket chat logs.
//!
//! Sends are shown immediately as optimistic entries and rolled back when the
//! server refuses them. Inbound messages are normalized, deduplicated and
//! then either reconcile an optimistic entry in place or append.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use deskrelay_core::traits::TicketService;
use deskrelay_core::{Attachment, DeskRelayError, Message, Session, TransportEvent, events};
use deskrelay_notify::NotificationAggregator;
use deskrelay_transport::{ConnectionManager, RoomManager, ack_error};

use crate::dedup::{Decision, decide, reconciled};
use crate::normalize::{IncomingMessage, normalize_history_record, normalize_message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    /// How long to wait for a history reply over the live connection.
    pub history_timeout: Duration,
    pub file_dedup_window: Duration,
    pub ack_timeout: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            history_timeout: Duration::from_millis(1000),
            file_dedup_window: Duration::from_millis(5000),
            ack_timeout: Duration::from_secs(10),
        }
    }
}

/// Outcome of a send the server accepted.
#[derive(Debug)]
pub struct SendReceipt {
    pub temp_id: String,
    /// Set when the attachment failed to upload and only the text was sent.
    pub upload_error: Option<DeskRelayError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Duplicate,
    Reconciled,
    Appended,
}

pub struct MessageEngine {
    session: Session,
    connection: Arc<ConnectionManager>,
    rooms: Arc<RoomManager>,
    service: Arc<dyn TicketService>,
    aggregator: Arc<NotificationAggregator>,
    settings: ChatSettings,
    logs: DashMap<String, Vec<Message>>,
    updates: broadcast::Sender<Message>,
}

impl MessageEngine {
    pub fn new(
        session: Session,
        connection: Arc<ConnectionManager>,
        rooms: Arc<RoomManager>,
        service: Arc<dyn TicketService>,
        aggregator: Arc<NotificationAggregator>,
        settings: ChatSettings,
        update_buffer: usize,
    ) -> Self {
        let (updates, _) = broadcast::channel(update_buffer.max(1));
        Self {
            session,
            connection,
            rooms,
            service,
            aggregator,
            settings,
            logs: DashMap::new(),
            updates,
        }
    }

    /// Every message that enters a log, optimistic entries included.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.updates.subscribe()
    }

    /// Send a message, optionally with an attachment.
    ///
    /// An attachment that fails to upload does not stop the text from being
    /// sent; the failure is returned in the receipt. If the server refuses
    /// the message, or does not acknowledge it in time, the optimistic entry
    /// is removed and the error returned.
    pub async fn send(
        &self,
        issue_id: &str,
        text: &str,
        file: Option<Attachment>,
    ) -> Result<SendReceipt, DeskRelayError> {
        if text.trim().is_empty() && file.is_none() {
            return Err(DeskRelayError::Validation(
                "a message needs text or an attachment".to_string(),
            ));
        }

        let temp_id = format!("temp_{}", uuid::Uuid::new_v4().simple());
        let mut upload_error = None;
        let uploaded = match file {
            Some(file) => match self.service.upload_attachment(issue_id, &file).await {
                Ok(uploaded) => Some(uploaded),
                Err(e) => {
                    warn!(issue_id = %issue_id, file = %file.file_name, error = %e, "attachment upload failed");
                    if text.trim().is_empty() {
                        return Err(e);
                    }
                    upload_error = Some(e);
                    None
                }
            },
            None => None,
        };

        let now = Utc::now();
        let optimistic = Message {
            id: temp_id.clone(),
            text: text.to_string(),
            sender_id: self.session.id.clone(),
            sender_name: self.session.display_name.clone(),
            sender_profile_image: self.session.profile_image.clone(),
            created_at: now,
            issue_id: issue_id.to_string(),
            file_url: uploaded.as_ref().map(|u| u.file_url.clone()),
            file_name: uploaded.as_ref().map(|u| u.file_name.clone()),
            file_upload_id: uploaded.as_ref().map(|u| u.file_upload_id.clone()),
            client_timestamp: Some(now.timestamp_millis()),
            is_optimistic: true,
        };

        let mut payload = json!({
            "issueId": issue_id,
            "message": optimistic.text,
            "senderId": optimistic.sender_id,
            "senderName": optimistic.sender_name,
            "senderProfileImage": optimistic.sender_profile_image,
            "createdAt": now.to_rfc3339(),
            "tempId": temp_id,
            "clientTimestamp": optimistic.client_timestamp,
        });
        if let Some(uploaded) = &uploaded {
            payload["fileUrl"] = json!(uploaded.file_url);
            payload["fileName"] = json!(uploaded.file_name);
            payload["fileUploadId"] = json!(uploaded.file_upload_id);
        }

        self.logs
            .entry(issue_id.to_string())
            .or_default()
            .push(optimistic.clone());
        let _ = self.updates.send(optimistic);

        if let Err(e) = self.deliver(payload).await {
            self.rollback(issue_id, &temp_id);
            warn!(issue_id = %issue_id, temp_id = %temp_id, error = %e, "send failed, optimistic message removed");
            return Err(e);
        }

        debug!(issue_id = %issue_id, temp_id = %temp_id, "message acknowledged");
        Ok(SendReceipt {
            temp_id,
            upload_error,
        })
    }

    async fn deliver(&self, payload: Value) -> Result<(), DeskRelayError> {
        let ack = tokio::time::timeout(
            self.settings.ack_timeout,
            self.connection.emit_with_ack(events::SEND_MESSAGE, payload),
        )
        .await
        .map_err(|_| DeskRelayError::Timeout {
            duration: self.settings.ack_timeout,
        })??;
        match ack_error(&ack) {
            Some(reason) => Err(DeskRelayError::Rejected(reason)),
            None => Ok(()),
        }
    }

    fn rollback(&self, issue_id: &str, temp_id: &str) {
        if let Some(mut log) = self.logs.get_mut(issue_id) {
            log.retain(|m| !(m.is_optimistic && m.id == temp_id));
        }
    }

    /// Ingest a live `messageReceived` payload.
    pub async fn receive(&self, payload: &Value) -> Result<ReceiveOutcome, DeskRelayError> {
        let incoming = normalize_message(payload)?;
        Ok(self.ingest(incoming, true).await)
    }

    async fn ingest(&self, incoming: IncomingMessage, signal: bool) -> ReceiveOutcome {
        let IncomingMessage { message, temp_id } = incoming;
        let issue_id = message.issue_id.clone();

        let (outcome, stored) = {
            let mut log = self.logs.entry(issue_id.clone()).or_default();
            match decide(&log, &message, temp_id.as_deref(), self.settings.file_dedup_window) {
                Decision::Duplicate => (ReceiveOutcome::Duplicate, None),
                Decision::Reconcile(pos) => {
                    let confirmed = reconciled(&log[pos], message);
                    log[pos] = confirmed.clone();
                    (ReceiveOutcome::Reconciled, Some(confirmed))
                }
                Decision::Append => {
                    log.push(message.clone());
                    (ReceiveOutcome::Appended, Some(message))
                }
            }
        };

        let Some(stored) = stored else {
            debug!(issue_id = %issue_id, "duplicate message discarded");
            return outcome;
        };
        let _ = self.updates.send(stored.clone());
        if signal {
            let viewing = self.rooms.is_viewing(&issue_id).await;
            self.aggregator.record_message(&stored, viewing).await;
        }
        outcome
    }

    /// Prior conversation of a ticket.
    ///
    /// Asked over the live connection first; with no connection, or no reply
    /// within the history timeout, the REST service is used instead.
    pub async fn fetch_history(&self, issue_id: &str) -> Result<Vec<Message>, DeskRelayError> {
        if self.connection.current().await.is_some() {
            if let Some(records) = self.fetch_live(issue_id).await? {
                return Ok(normalize_history(issue_id, &records));
            }
            info!(issue_id = %issue_id, "no history reply over realtime connection, using REST");
        }
        let records = self.service.fetch_chat_history(issue_id).await?;
        Ok(normalize_history(issue_id, &records))
    }

    /// `Ok(None)` means fall back to REST.
    async fn fetch_live(&self, issue_id: &str) -> Result<Option<Vec<Value>>, DeskRelayError> {
        let response_event = format!(
            "{}{}",
            events::FETCH_MESSAGES_RESPONSE_PREFIX,
            uuid::Uuid::new_v4().simple()
        );
        // Subscribe before asking so the reply cannot slip past.
        let mut inbound = self.connection.subscribe();
        if let Err(e) = self
            .connection
            .emit(
                events::FETCH_MESSAGES,
                json!({"issueId": issue_id, "responseEvent": response_event}),
            )
            .await
        {
            warn!(issue_id = %issue_id, error = %e, "history request not sent");
            return Ok(None);
        }

        let deadline = tokio::time::sleep(self.settings.history_timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => return Ok(None),
                event = inbound.recv() => match event {
                    Ok(TransportEvent::Inbound(ev)) if ev.name == response_event => {
                        return history_reply(ev.payload).map(Some);
                    }
                    Ok(TransportEvent::Disconnected { .. }) | Err(RecvError::Closed) => return Ok(None),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "history wait lagged behind inbound events");
                    }
                },
            }
        }
    }

    /// Fetch history and merge it into the ticket's log without unread signals.
    /// Returns how many messages were new or reconciled.
    pub async fn load_history(&self, issue_id: &str) -> Result<usize, DeskRelayError> {
        let history = self.fetch_history(issue_id).await?;
        let mut changed = 0;
        for message in history {
            let incoming = IncomingMessage {
                message,
                temp_id: None,
            };
            if self.ingest(incoming, false).await != ReceiveOutcome::Duplicate {
                changed += 1;
            }
        }
        debug!(issue_id = %issue_id, changed, "history loaded");
        Ok(changed)
    }

    /// Snapshot of a ticket's log in display order.
    pub fn messages(&self, issue_id: &str) -> Vec<Message> {
        self.logs
            .get(issue_id)
            .map(|log| log.value().clone())
            .unwrap_or_default()
    }

    /// Drop a ticket's log.
    pub fn clear(&self, issue_id: &str) {
        self.logs.remove(issue_id);
    }

    /// The user is looking at this ticket: zero its unread count here and on
    /// the server.
    pub async fn mark_read(&self, issue_id: &str) {
        self.aggregator.reset_ticket(issue_id).await;
        let service = Arc::clone(&self.service);
        let issue_id = issue_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = service.mark_chat_read(&issue_id).await {
                warn!(issue_id = %issue_id, error = %e, "failed to mark chat read");
            }
        });
    }
}

/// A history reply is `{data: [...]}`, a bare array, or `{error}`.
fn history_reply(payload: Value) -> Result<Vec<Value>, DeskRelayError> {
    if let Some(reason) = ack_error(&payload) {
        return Err(DeskRelayError::Rejected(reason));
    }
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            _ => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

fn normalize_history(issue_id: &str, records: &[Value]) -> Vec<Message> {
    records
        .iter()
        .filter_map(|record| match normalize_history_record(issue_id, record) {
            Ok(incoming) => Some(incoming.message),
            Err(e) => {
                debug!(issue_id = %issue_id, error = %e, "skipping malformed history record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskrelay_core::{Role, Session};
    use deskrelay_notify::StatusMessages;
    use deskrelay_test_utils::{AckReply, MockTicketService, MockTransport};
    use deskrelay_transport::ReconnectPolicy;

    struct Fixture {
        transport: Arc<MockTransport>,
        service: Arc<MockTicketService>,
        rooms: Arc<RoomManager>,
        aggregator: Arc<NotificationAggregator>,
        engine: MessageEngine,
    }

    async fn fixture(connect: bool) -> Fixture {
        let session = Session::new("u1", Role::User).with_display_name("Ada");
        let transport = Arc::new(MockTransport::new());
        let service = Arc::new(MockTicketService::new());
        let connection = Arc::new(ConnectionManager::new(
            transport.clone(),
            ReconnectPolicy::default(),
            64,
        ));
        if connect {
            connection.connect(&session, Some("tok")).await;
        }
        let rooms = Arc::new(RoomManager::new(Arc::clone(&connection)));
        let aggregator = Arc::new(NotificationAggregator::new(
            session.clone(),
            service.clone(),
            StatusMessages::default(),
            16,
        ));
        let engine = MessageEngine::new(
            session,
            connection,
            Arc::clone(&rooms),
            service.clone(),
            Arc::clone(&aggregator),
            ChatSettings::default(),
            64,
        );
        Fixture {
            transport,
            service,
            rooms,
            aggregator,
            engine,
        }
    }

    fn attachment() -> Attachment {
        Attachment {
            file_name: "a.png".into(),
            content_type: Some("image/png".into()),
            bytes: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn send_then_echo_leaves_one_confirmed_entry() {
        let f = fixture(true).await;
        let receipt = f.engine.send("T1", "hello", None).await.unwrap();
        assert!(f.engine.messages("T1")[0].is_optimistic);

        let sent = f.transport.emitted_named(events::SEND_MESSAGE).await;
        assert_eq!(sent[0]["tempId"], json!(receipt.temp_id));
        assert_eq!(sent[0]["senderName"], json!("Ada"));
        assert!(sent[0]["clientTimestamp"].is_i64());

        let outcome = f
            .engine
            .receive(&json!({"id": "m1", "issueId": "T1", "message": "hello", "senderId": "u1", "tempId": receipt.temp_id}))
            .await
            .unwrap();
        assert_eq!(outcome, ReceiveOutcome::Reconciled);

        let log = f.engine.messages("T1");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].id, "m1");
        assert!(!log[0].is_optimistic);

        let again = f
            .engine
            .receive(&json!({"id": "m1", "issueId": "T1", "message": "hello", "senderId": "u1"}))
            .await
            .unwrap();
        assert_eq!(again, ReceiveOutcome::Duplicate);
        assert_eq!(f.engine.messages("T1").len(), 1);
    }

    #[tokio::test]
    async fn error_ack_rolls_back() {
        let f = fixture(true).await;
        f.engine.receive(&json!({"id": "m0", "issueId": "T1", "message": "hi", "senderId": "u2"})).await.unwrap();
        f.transport
            .push_ack(events::SEND_MESSAGE, AckReply::Value(json!({"error": "room closed"})))
            .await;

        let err = f.engine.send("T1", "hello", None).await.unwrap_err();
        assert!(matches!(err, DeskRelayError::Rejected(ref r) if r == "room closed"));
        assert_eq!(f.engine.messages("T1").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_ack_times_out_and_rolls_back() {
        let f = fixture(true).await;
        f.transport.push_ack(events::SEND_MESSAGE, AckReply::Never).await;

        let err = f.engine.send("T1", "hello", None).await.unwrap_err();
        assert!(matches!(err, DeskRelayError::Timeout { .. }));
        assert!(f.engine.messages("T1").is_empty());
    }

    #[tokio::test]
    async fn send_without_connection_fails_visibly() {
        let f = fixture(false).await;
        let err = f.engine.send("T1", "hello", None).await.unwrap_err();
        assert!(matches!(err, DeskRelayError::NotConnected));
        assert!(f.engine.messages("T1").is_empty());
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_sending() {
        let f = fixture(true).await;
        assert!(matches!(
            f.engine.send("T1", "   ", None).await,
            Err(DeskRelayError::Validation(_))
        ));
        assert!(f.transport.emitted().await.iter().all(|(e, _)| e != events::SEND_MESSAGE));
    }

    #[tokio::test]
    async fn attachment_is_uploaded_before_send() {
        let f = fixture(true).await;
        let receipt = f.engine.send("T1", "", Some(attachment())).await.unwrap();
        assert!(receipt.upload_error.is_none());

        let sent = f.transport.emitted_named(events::SEND_MESSAGE).await;
        assert_eq!(sent[0]["fileUrl"], json!("https://files.test/T1/a.png"));
        assert_eq!(sent[0]["fileUploadId"], json!("upload-1"));
        assert_eq!(sent[0]["message"], json!(""));
    }

    #[tokio::test]
    async fn failed_upload_still_sends_text() {
        let f = fixture(true).await;
        f.service.fail("upload_attachment").await;

        let receipt = f.engine.send("T1", "see attached", Some(attachment())).await.unwrap();
        assert!(matches!(receipt.upload_error, Some(DeskRelayError::Upload { .. })));
        let sent = f.transport.emitted_named(events::SEND_MESSAGE).await;
        assert!(sent[0].get("fileUrl").is_none());

        assert!(f.engine.send("T1", "", Some(attachment())).await.is_err());
        assert_eq!(f.engine.messages("T1").len(), 1);
    }

    #[tokio::test]
    async fn repeated_attachment_delivery_is_suppressed() {
        let f = fixture(true).await;
        let base = json!({"issueId": "T1", "senderId": "u2", "fileUrl": "https://files.test/T1/x.pdf"});
        let mut first = base.clone();
        first["id"] = json!("m1");
        first["clientTimestamp"] = json!(10_000);
        let mut second = base.clone();
        second["id"] = json!("m2");
        second["clientTimestamp"] = json!(14_999);
        let mut third = base;
        third["id"] = json!("m3");
        third["clientTimestamp"] = json!(20_001);

        assert_eq!(f.engine.receive(&first).await.unwrap(), ReceiveOutcome::Appended);
        assert_eq!(f.engine.receive(&second).await.unwrap(), ReceiveOutcome::Duplicate);
        assert_eq!(f.engine.receive(&third).await.unwrap(), ReceiveOutcome::Appended);
        assert_eq!(f.engine.messages("T1").len(), 2);
    }

    #[tokio::test]
    async fn unread_only_for_unviewed_peer_messages() {
        let f = fixture(true).await;
        f.rooms.join_room("T1").await;

        f.engine.receive(&json!({"id": "a", "issueId": "T1", "message": "x", "senderId": "u2"})).await.unwrap();
        f.engine.receive(&json!({"id": "b", "issueId": "T2", "message": "y", "senderId": "u2"})).await.unwrap();
        f.engine.receive(&json!({"id": "b", "issueId": "T2", "message": "y", "senderId": "u2"})).await.unwrap();
        f.engine.receive(&json!({"id": "c", "issueId": "T2", "message": "z", "senderId": "u1"})).await.unwrap();

        assert_eq!(f.aggregator.unread_count("T1").await, 0);
        assert_eq!(f.aggregator.unread_count("T2").await, 1);
    }

    #[tokio::test]
    async fn mark_read_resets_and_informs_server() {
        let f = fixture(true).await;
        f.engine.receive(&json!({"id": "a", "issueId": "T1", "message": "x", "senderId": "u2"})).await.unwrap();
        f.engine.mark_read("T1").await;
        f.engine.receive(&json!({"id": "b", "issueId": "T2", "message": "y", "senderId": "u2"})).await.unwrap();

        assert_eq!(f.aggregator.unread_count("T1").await, 0);
        f.service.wait_for_calls("mark_chat_read", 1).await;
    }

    #[tokio::test]
    async fn history_prefers_live_reply() {
        let f = fixture(true).await;
        let transport = f.transport.clone();
        let responder = tokio::spawn(async move {
            let requests = transport.wait_for_emits(events::FETCH_MESSAGES, 1).await;
            let reply_to = requests[0]["responseEvent"].as_str().unwrap().to_string();
            assert!(reply_to.starts_with(events::FETCH_MESSAGES_RESPONSE_PREFIX));
            transport
                .inject(&reply_to, json!({"data": [{"_id": "h1", "message": "old", "senderId": "u2"}]}))
                .await;
        });

        let history = f.engine.fetch_history("T1").await.unwrap();
        responder.await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].issue_id, "T1");
        assert_eq!(f.service.call_count("fetch_chat_history").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn history_falls_back_to_rest_after_timeout() {
        let f = fixture(true).await;
        f.service
            .set_history("T1", vec![json!({"_id": "h1", "message": "old"}), json!("junk")])
            .await;

        let history = f.engine.fetch_history("T1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(f.transport.emitted_named(events::FETCH_MESSAGES).await.len(), 1);
        assert_eq!(f.service.call_count("fetch_chat_history").await, 1);
    }

    #[tokio::test]
    async fn history_without_connection_uses_rest() {
        let f = fixture(false).await;
        f.service.set_history("T1", vec![json!({"_id": "h1", "message": "old"})]).await;
        assert_eq!(f.engine.fetch_history("T1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn load_history_merges_without_unread() {
        let f = fixture(false).await;
        f.engine.receive(&json!({"id": "h1", "issueId": "T1", "message": "old", "senderId": "u2"})).await.unwrap();
        f.service
            .set_history(
                "T1",
                vec![
                    json!({"_id": "h1", "message": "old", "senderId": "u2"}),
                    json!({"_id": "h2", "message": "older", "senderId": "u2"}),
                ],
            )
            .await;

        assert_eq!(f.engine.load_history("T1").await.unwrap(), 1);
        assert_eq!(f.engine.messages("T1").len(), 2);
        assert_eq!(f.aggregator.unread_count("T1").await, 1);
    }

    #[tokio::test]
    async fn reloading_history_without_ids_adds_nothing() {
        let f = fixture(false).await;
        f.service
            .set_history(
                "T1",
                vec![json!({"message": "no id", "senderId": "u2", "createdAt": 1_700_000_000_000_i64})],
            )
            .await;

        assert_eq!(f.engine.load_history("T1").await.unwrap(), 1);
        assert_eq!(f.engine.load_history("T1").await.unwrap(), 0);
        assert_eq!(f.engine.messages("T1").len(), 1);
    }

    #[test]
    fn history_reply_shapes() {
        assert_eq!(history_reply(json!([1, 2])).unwrap().len(), 2);
        assert_eq!(history_reply(json!({"data": [1]})).unwrap().len(), 1);
        assert!(matches!(
            history_reply(json!({"error": "forbidden"})),
            Err(DeskRelayError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn clear_drops_only_that_ticket() {
        let f = fixture(false).await;
        f.engine.receive(&json!({"id": "a", "issueId": "T1", "senderId": "u2"})).await.unwrap();
        f.engine.receive(&json!({"id": "b", "issueId": "T2", "senderId": "u2"})).await.unwrap();
        f.engine.clear("T1");
        assert!(f.engine.messages("T1").is_empty());
        assert_eq!(f.engine.messages("T2").len(), 1);
    }
}
