// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the transport, chat, and notification components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Role of the signed-in identity. Drives notification scoping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Admin and SuperAdmin sessions receive every status notification.
    pub fn sees_all_notifications(self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

/// The authenticated identity. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub role: Role,
    /// Name shown on outgoing messages.
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl Session {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            display_name: String::new(),
            profile_image: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

/// A session together with the bearer token that authenticates it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub session: Session,
    pub token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("session", &self.session)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Observable state of the single realtime connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// A dial is in flight; `attempt` is 0 for the first try.
    Connecting { attempt: u32 },
    Connected { socket_id: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }
}

/// A chat message inside one ticket's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub issue_id: String,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_upload_id: Option<String>,
    /// Client clock in epoch milliseconds at send time.
    pub client_timestamp: Option<i64>,
    #[serde(default)]
    pub is_optimistic: bool,
}

impl Message {
    /// One-line preview used for ticket activity listings.
    pub fn preview(&self) -> String {
        match (&self.file_url, &self.file_name) {
            (Some(_), Some(name)) => format!("📎 {name}"),
            (Some(_), None) => "📎 attachment".to_string(),
            _ => self.text.clone(),
        }
    }
}

/// Severity of a notification or transient alert.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationType {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationType {
    /// Maps a ticket status literal to the alert severity shown for it.
    pub fn for_status(status: &str) -> Self {
        match status {
            "completed" | "approved" => NotificationType::Success,
            "rejected" => NotificationType::Error,
            _ => NotificationType::Info,
        }
    }
}

/// A status-change notification held in the notification log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub issue_id: String,
    pub user_id: Option<String>,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub topic: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// A notification as stored by the backend.
///
/// Accepts both `_id`/`id` and `isRead`/`read` spellings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub issue_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: String,
    /// Severity literal; unknown or missing values fall back to `info`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub old_status: Option<String>,
    #[serde(default)]
    pub new_status: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "isRead")]
    pub read: bool,
}

impl From<NotificationRecord> for Notification {
    fn from(record: NotificationRecord) -> Self {
        Notification {
            id: record.id,
            issue_id: record.issue_id,
            user_id: record.user_id,
            message: record.message,
            kind: record
                .kind
                .as_deref()
                .and_then(|k| k.parse().ok())
                .unwrap_or_default(),
            old_status: record.old_status,
            new_status: record.new_status,
            topic: record.topic,
            comment: record.comment,
            created_at: record.created_at.unwrap_or_else(Utc::now),
            read: record.read,
        }
    }
}

/// A raw ticket status transition as pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusChange {
    /// Server-assigned notification id, when the server supplies one.
    pub id: Option<String>,
    pub issue_id: String,
    pub old_status: Option<String>,
    pub new_status: String,
    pub topic: Option<String>,
    pub comment: Option<String>,
    /// Recipient the change is addressed to.
    pub user_id: Option<String>,
    /// Server-rendered text; overrides the generated one when present.
    pub message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A transient, user-facing alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: NotificationType,
    pub text: String,
    pub issue_id: Option<String>,
}

impl Alert {
    pub fn new(level: NotificationType, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            issue_id: None,
        }
    }

    pub fn for_issue(mut self, issue_id: impl Into<String>) -> Self {
        self.issue_id = Some(issue_id.into());
        self
    }
}

/// A local file to attach to an outgoing message.
#[derive(Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Result of a successful attachment upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_url: String,
    pub file_name: String,
    pub file_upload_id: String,
}

/// A named event received over the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

impl InboundEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Everything the connection manager publishes to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected { socket_id: String },
    Disconnected { reason: String },
    Inbound(InboundEvent),
}
