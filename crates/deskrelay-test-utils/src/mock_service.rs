// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock REST collaborator for deterministic testing.
//!
//! `MockTicketService` implements `TicketService` over in-memory state and
//! records every call so tests can assert on remote side effects.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};

use deskrelay_core::traits::TicketService;
use deskrelay_core::{Attachment, DeskRelayError, Notification, NotificationRecord, UploadedFile};

#[derive(Default)]
struct State {
    notifications: Vec<Value>,
    history: HashMap<String, Vec<Value>>,
    unread: HashMap<String, u32>,
    saved: Vec<Notification>,
    calls: Vec<String>,
    failing: HashSet<&'static str>,
    uploads: u32,
}

/// An in-memory ticket service.
///
/// Operations named in [`MockTicketService::fail`] return a service error.
pub struct MockTicketService {
    state: Mutex<State>,
    notify: Notify,
}

impl MockTicketService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
        }
    }

    /// Replace the stored notification records returned by `fetch_notifications`.
    pub async fn set_notifications(&self, records: Vec<Value>) {
        self.state.lock().await.notifications = records;
    }

    /// Replace the raw chat history for a ticket.
    pub async fn set_history(&self, issue_id: &str, records: Vec<Value>) {
        self.state
            .lock()
            .await
            .history
            .insert(issue_id.to_string(), records);
    }

    pub async fn set_unread(&self, issue_id: &str, count: u32) {
        self.state
            .lock()
            .await
            .unread
            .insert(issue_id.to_string(), count);
    }

    /// Make an operation fail, by method name (e.g. `"delete_all_notifications"`).
    pub async fn fail(&self, operation: &'static str) {
        self.state.lock().await.failing.insert(operation);
    }

    /// Stop failing an operation.
    pub async fn recover(&self, operation: &'static str) {
        self.state.lock().await.failing.remove(operation);
    }

    /// Notifications persisted through `save_notification`.
    pub async fn saved(&self) -> Vec<Notification> {
        self.state.lock().await.saved.clone()
    }

    /// Every call as `"<method> <arg>"`, in order.
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    /// Number of calls to `method`.
    pub async fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(method))
            .count()
    }

    /// Wait until `method` has been called at least `count` times.
    ///
    /// Fire-and-forget operations run on spawned tasks; this lets tests
    /// observe them without sleeping.
    pub async fn wait_for_calls(&self, method: &str, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.call_count(method).await >= count {
                return;
            }
            notified.await;
        }
    }

    async fn enter(&self, method: &'static str, arg: &str) -> Result<(), DeskRelayError> {
        let mut state = self.state.lock().await;
        state.calls.push(format!("{method} {arg}"));
        let failing = state.failing.contains(method);
        drop(state);
        self.notify.notify_waiters();
        if failing {
            Err(DeskRelayError::service(format!("{method} failed")))
        } else {
            Ok(())
        }
    }
}

impl Default for MockTicketService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketService for MockTicketService {
    fn name(&self) -> &str {
        "mock-service"
    }

    async fn fetch_notifications(
        &self,
        user_id: &str,
    ) -> Result<Vec<NotificationRecord>, DeskRelayError> {
        self.enter("fetch_notifications", user_id).await?;
        let records = self.state.lock().await.notifications.clone();
        records
            .into_iter()
            .map(|r| {
                serde_json::from_value(r).map_err(|e| DeskRelayError::InvalidPayload(e.to_string()))
            })
            .collect()
    }

    async fn save_notification(&self, notification: &Notification) -> Result<(), DeskRelayError> {
        self.enter("save_notification", &notification.id).await?;
        self.state.lock().await.saved.push(notification.clone());
        Ok(())
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), DeskRelayError> {
        self.enter("mark_notification_read", notification_id).await
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<(), DeskRelayError> {
        self.enter("mark_all_notifications_read", user_id).await
    }

    async fn delete_notification(&self, notification_id: &str) -> Result<(), DeskRelayError> {
        self.enter("delete_notification", notification_id).await
    }

    async fn delete_all_notifications(&self, user_id: &str) -> Result<(), DeskRelayError> {
        self.enter("delete_all_notifications", user_id).await
    }

    async fn fetch_chat_history(&self, issue_id: &str) -> Result<Vec<Value>, DeskRelayError> {
        self.enter("fetch_chat_history", issue_id).await?;
        Ok(self
            .state
            .lock()
            .await
            .history
            .get(issue_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_chat_read(&self, issue_id: &str) -> Result<(), DeskRelayError> {
        self.enter("mark_chat_read", issue_id).await?;
        self.state.lock().await.unread.remove(issue_id);
        Ok(())
    }

    async fn chat_unread_count(&self, issue_id: &str) -> Result<u32, DeskRelayError> {
        self.enter("chat_unread_count", issue_id).await?;
        Ok(self
            .state
            .lock()
            .await
            .unread
            .get(issue_id)
            .copied()
            .unwrap_or(0))
    }

    async fn upload_attachment(
        &self,
        issue_id: &str,
        attachment: &Attachment,
    ) -> Result<UploadedFile, DeskRelayError> {
        if let Err(e) = self.enter("upload_attachment", issue_id).await {
            return Err(DeskRelayError::Upload {
                message: e.to_string(),
                source: None,
            });
        }
        let mut state = self.state.lock().await;
        state.uploads += 1;
        Ok(UploadedFile {
            file_url: format!("https://files.test/{issue_id}/{}", attachment.file_name),
            file_name: attachment.file_name.clone(),
            file_upload_id: format!("upload-{}", state.uploads),
        })
    }
}
