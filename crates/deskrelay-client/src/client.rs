// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-session service root.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use deskrelay_chat::{MessageEngine, SendReceipt};
use deskrelay_core::traits::{TicketService, Transport};
use deskrelay_core::{
    Alert, Attachment, ConnectionState, Credentials, DeskRelayError, Message, Notification,
    NotificationType, Session, events,
};
use deskrelay_notify::{NotificationAggregator, StatusMessages, TicketActivity};
use deskrelay_transport::{ConnectionManager, RoomManager, ack_error};

use crate::dispatch;
use crate::options::ClientOptions;
use crate::subscription::Subscription;

/// Components shared with the dispatcher task.
pub(crate) struct Components {
    pub(crate) connection: Arc<ConnectionManager>,
    pub(crate) rooms: Arc<RoomManager>,
    pub(crate) engine: Arc<MessageEngine>,
    pub(crate) aggregator: Arc<NotificationAggregator>,
    pub(crate) status_tx: broadcast::Sender<Notification>,
}

/// Realtime messaging and notifications for one signed-in session.
///
/// Construct on login, [`start`](Self::start), and [`shutdown`](Self::shutdown)
/// on logout. Nothing is shared between clients.
pub struct RelayClient {
    credentials: Credentials,
    options: ClientOptions,
    parts: Arc<Components>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl RelayClient {
    pub fn new(
        credentials: Credentials,
        transport: Arc<dyn Transport>,
        service: Arc<dyn TicketService>,
        options: ClientOptions,
    ) -> Self {
        let session = credentials.session.clone();
        let connection = Arc::new(ConnectionManager::new(
            transport,
            options.reconnect,
            options.event_buffer,
        ));
        let rooms = Arc::new(RoomManager::new(Arc::clone(&connection)));
        let aggregator = Arc::new(NotificationAggregator::new(
            session.clone(),
            Arc::clone(&service),
            StatusMessages::new(options.locale),
            options.event_buffer,
        ));
        let engine = Arc::new(MessageEngine::new(
            session,
            Arc::clone(&connection),
            Arc::clone(&rooms),
            service,
            Arc::clone(&aggregator),
            options.chat,
            options.event_buffer,
        ));
        let (status_tx, _) = broadcast::channel(options.event_buffer.max(1));

        Self {
            credentials,
            options,
            parts: Arc::new(Components {
                connection,
                rooms,
                engine,
                aggregator,
                status_tx,
            }),
            dispatcher: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Start routing inbound events and connect.
    ///
    /// Without a token the client stays disconnected; REST-backed operations
    /// still work.
    pub async fn start(&self) -> ConnectionState {
        {
            let mut dispatcher = self.dispatcher.lock().await;
            if dispatcher.is_none() {
                let events = self.parts.connection.subscribe();
                *dispatcher = Some(tokio::spawn(dispatch::run(
                    Arc::clone(&self.parts),
                    events,
                    self.cancel.child_token(),
                )));
            }
        }
        self.parts
            .connection
            .connect(&self.credentials.session, self.credentials.token.as_deref())
            .await
    }

    /// Stop routing events and disconnect. Idempotent.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.dispatcher.lock().await.take() {
            let _ = handle.await;
        }
        self.parts.connection.disconnect().await;
        info!(user_id = %self.credentials.session.id, "client shut down");
    }

    pub fn session(&self) -> &Session {
        &self.credentials.session
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.parts.connection.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.parts.connection.watch_state()
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.parts.connection
    }

    pub fn rooms(&self) -> &Arc<RoomManager> {
        &self.parts.rooms
    }

    pub fn engine(&self) -> &Arc<MessageEngine> {
        &self.parts.engine
    }

    pub fn aggregator(&self) -> &Arc<NotificationAggregator> {
        &self.parts.aggregator
    }

    // Chat

    /// Start viewing a ticket: join its room, clear its unread count and load
    /// its history. A history failure is logged; the room stays joined.
    pub async fn open_ticket(&self, issue_id: &str) -> Vec<Message> {
        self.parts.rooms.join_room(issue_id).await;
        self.parts.engine.mark_read(issue_id).await;
        if let Err(e) = self.parts.engine.load_history(issue_id).await {
            warn!(issue_id = %issue_id, error = %e, "could not load chat history");
        }
        self.parts.engine.messages(issue_id)
    }

    /// Stop viewing a ticket. Its log is kept.
    pub async fn close_ticket(&self, issue_id: &str) {
        self.parts.rooms.leave_room(issue_id).await;
    }

    pub async fn join_room(&self, issue_id: &str) {
        self.parts.rooms.join_room(issue_id).await;
    }

    pub async fn leave_room(&self, issue_id: &str) {
        self.parts.rooms.leave_room(issue_id).await;
    }

    pub async fn send_message(
        &self,
        issue_id: &str,
        text: &str,
        file: Option<Attachment>,
    ) -> Result<SendReceipt, DeskRelayError> {
        let result = self.parts.engine.send(issue_id, text, file).await;
        match &result {
            Ok(receipt) => {
                if let Some(e) = &receipt.upload_error {
                    self.alert(Alert::new(
                        NotificationType::Error,
                        format!("Attachment was not sent: {e}"),
                    )
                    .for_issue(issue_id));
                }
            }
            Err(e) => self.alert(
                Alert::new(NotificationType::Error, format!("Message was not sent: {e}"))
                    .for_issue(issue_id),
            ),
        }
        result
    }

    pub async fn fetch_history(&self, issue_id: &str) -> Result<Vec<Message>, DeskRelayError> {
        self.parts.engine.fetch_history(issue_id).await
    }

    pub async fn load_history(&self, issue_id: &str) -> Result<usize, DeskRelayError> {
        self.parts.engine.load_history(issue_id).await
    }

    pub fn messages(&self, issue_id: &str) -> Vec<Message> {
        self.parts.engine.messages(issue_id)
    }

    pub fn clear_chat(&self, issue_id: &str) {
        self.parts.engine.clear(issue_id);
    }

    pub async fn mark_chat_read(&self, issue_id: &str) {
        self.parts.engine.mark_read(issue_id).await;
    }

    // Notifications

    pub async fn notifications(&self) -> Vec<Notification> {
        self.parts.aggregator.notifications().await
    }

    pub async fn unread_count(&self, issue_id: &str) -> usize {
        self.parts.aggregator.unread_count(issue_id).await
    }

    pub async fn activity(&self, issue_id: &str) -> Option<TicketActivity> {
        self.parts.aggregator.activity(issue_id).await
    }

    pub async fn refresh_unread(&self, issue_id: &str) -> Result<u32, DeskRelayError> {
        self.parts.aggregator.refresh_unread(issue_id).await
    }

    pub async fn fetch_backlog(&self) -> Result<usize, DeskRelayError> {
        self.parts.aggregator.fetch_backlog().await
    }

    pub async fn mark_notification_read(&self, id: &str) -> bool {
        self.parts.aggregator.mark_read(id).await
    }

    pub async fn mark_all_read(&self) -> Result<(), DeskRelayError> {
        self.parts.aggregator.mark_all_read().await
    }

    pub async fn remove_notification(&self, id: &str) -> Result<(), DeskRelayError> {
        self.parts.aggregator.remove(id).await
    }

    pub async fn clear_notifications(&self) -> Result<(), DeskRelayError> {
        self.parts.aggregator.clear_all().await
    }

    /// Ask the server to move a ticket to `status`.
    pub async fn update_status(
        &self,
        issue_id: &str,
        status: &str,
        topic: Option<&str>,
        comment: Option<&str>,
    ) -> Result<(), DeskRelayError> {
        let mut payload = json!({"issueId": issue_id, "status": status, "comment": comment});
        if let Some(topic) = topic {
            payload["topic"] = json!(topic);
        }

        let result = match tokio::time::timeout(
            self.options.chat.ack_timeout,
            self.parts
                .connection
                .emit_with_ack(events::REPORT_STATUS_UPDATE, payload),
        )
        .await
        {
            Err(_) => Err(DeskRelayError::Timeout {
                duration: self.options.chat.ack_timeout,
            }),
            Ok(Err(e)) => Err(e),
            Ok(Ok(ack)) => match ack_error(&ack) {
                Some(reason) => Err(DeskRelayError::Rejected(reason)),
                None => Ok(()),
            },
        };

        if let Err(e) = &result {
            warn!(issue_id = %issue_id, status, error = %e, "status update failed");
            self.alert(
                Alert::new(NotificationType::Warning, format!("Status was not updated: {e}"))
                    .for_issue(issue_id),
            );
        } else {
            info!(issue_id = %issue_id, status, "status update accepted");
        }
        result
    }

    // Listeners

    pub fn alert(&self, alert: Alert) {
        self.parts.aggregator.alert(alert);
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.parts.aggregator.subscribe_alerts()
    }

    /// Call `handler` for every message entering any chat log.
    pub fn on_message<F>(&self, handler: F) -> Subscription
    where
        F: Fn(Message) + Send + 'static,
    {
        listen(self.parts.engine.subscribe(), handler)
    }

    /// Call `handler` for every status-change notification delivered to this
    /// session.
    pub fn on_status_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(Notification) + Send + 'static,
    {
        listen(self.parts.status_tx.subscribe(), handler)
    }

    /// Call `handler` for every transient alert.
    pub fn on_alert<F>(&self, handler: F) -> Subscription
    where
        F: Fn(Alert) + Send + 'static,
    {
        listen(self.subscribe_alerts(), handler)
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn listen<T, F>(mut rx: broadcast::Receiver<T>, handler: F) -> Subscription
where
    T: Clone + Send + 'static,
    F: Fn(T) + Send + 'static,
{
    Subscription::new(tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(item) => handler(item),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "listener lagged, events dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    }))
}
