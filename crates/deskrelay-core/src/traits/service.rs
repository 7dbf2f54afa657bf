// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST collaborator trait for ticket chat and notification endpoints.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DeskRelayError;
use crate::types::{Attachment, Notification, NotificationRecord, UploadedFile};

/// The ticket/report service consumed over REST.
///
/// Implementations carry the session's bearer token themselves.
#[async_trait]
pub trait TicketService: Send + Sync + 'static {
    /// Returns the human-readable name of this service adapter.
    fn name(&self) -> &str;

    /// Notifications stored for a user, including ones generated while offline.
    async fn fetch_notifications(&self, user_id: &str)
    -> Result<Vec<NotificationRecord>, DeskRelayError>;

    /// Persists a notification produced from a live status change.
    async fn save_notification(&self, notification: &Notification) -> Result<(), DeskRelayError>;

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), DeskRelayError>;

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<(), DeskRelayError>;

    async fn delete_notification(&self, notification_id: &str) -> Result<(), DeskRelayError>;

    async fn delete_all_notifications(&self, user_id: &str) -> Result<(), DeskRelayError>;

    /// Raw chat history records for a ticket, oldest first.
    ///
    /// Records are returned unnormalized; sender fields may be nested or flat.
    async fn fetch_chat_history(&self, issue_id: &str) -> Result<Vec<Value>, DeskRelayError>;

    /// Marks every message of a ticket as seen by the current session.
    async fn mark_chat_read(&self, issue_id: &str) -> Result<(), DeskRelayError>;

    /// Server-side unread message count for a ticket.
    async fn chat_unread_count(&self, issue_id: &str) -> Result<u32, DeskRelayError>;

    /// Uploads a chat attachment and returns where it is stored.
    async fn upload_attachment(
        &self,
        issue_id: &str,
        attachment: &Attachment,
    ) -> Result<UploadedFile, DeskRelayError>;
}
