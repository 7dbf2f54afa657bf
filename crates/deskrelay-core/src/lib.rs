// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Deskrelay realtime messaging core.
//!
//! This crate provides the error type, domain types, realtime event names and
//! the adapter traits (transport and REST service) used throughout the
//! Deskrelay workspace.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::DeskRelayError;
pub use types::{
    Alert, Attachment, ConnectionState, Credentials, InboundEvent, Message, Notification,
    NotificationRecord, NotificationType, Role, Session, StatusChange, TransportEvent,
    UploadedFile,
};

pub use traits::{Connection, Dialed, TicketService, Transport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_render() {
        let cases = [
            (DeskRelayError::Config("bad".into()), "configuration error: bad"),
            (DeskRelayError::transport("closed"), "transport error: closed"),
            (DeskRelayError::NotConnected, "not connected to the realtime server"),
            (DeskRelayError::service("404"), "service error: 404"),
            (DeskRelayError::Rejected("nope".into()), "rejected by server: nope"),
            (DeskRelayError::InvalidPayload("x".into()), "invalid payload: x"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn transient_errors() {
        assert!(DeskRelayError::transport("reset").is_transient());
        assert!(DeskRelayError::NotConnected.is_transient());
        assert!(
            DeskRelayError::Timeout {
                duration: std::time::Duration::from_secs(1)
            }
            .is_transient()
        );
        assert!(!DeskRelayError::Rejected("auth".into()).is_transient());
        assert!(!DeskRelayError::Config("x".into()).is_transient());
    }

    #[test]
    fn role_parses_and_scopes() {
        use std::str::FromStr;

        for role in [Role::User, Role::Admin, Role::SuperAdmin] {
            assert_eq!(Role::from_str(&role.to_string()).unwrap(), role);
        }
        assert!(!Role::User.sees_all_notifications());
        assert!(Role::Admin.sees_all_notifications());
        assert!(Role::SuperAdmin.sees_all_notifications());
    }

    #[test]
    fn status_maps_to_notification_type() {
        assert_eq!(NotificationType::for_status("completed"), NotificationType::Success);
        assert_eq!(NotificationType::for_status("approved"), NotificationType::Success);
        assert_eq!(NotificationType::for_status("rejected"), NotificationType::Error);
        assert_eq!(NotificationType::for_status("pending"), NotificationType::Info);
        assert_eq!(NotificationType::for_status("in_progress"), NotificationType::Info);
    }

    #[test]
    fn notification_record_accepts_legacy_spellings() {
        let json = serde_json::json!({
            "_id": "n1",
            "issueId": "T1",
            "message": "done",
            "type": "success",
            "isRead": true
        });
        let record: NotificationRecord = serde_json::from_value(json).unwrap();
        let notification = Notification::from(record);
        assert_eq!(notification.id, "n1");
        assert_eq!(notification.kind, NotificationType::Success);
        assert!(notification.read);
    }

    #[test]
    fn notification_record_defaults_unknown_type_to_info() {
        let json = serde_json::json!({"id": "n2", "type": "status-change"});
        let record: NotificationRecord = serde_json::from_value(json).unwrap();
        let notification = Notification::from(record);
        assert_eq!(notification.kind, NotificationType::Info);
        assert!(!notification.read);
    }

    #[test]
    fn message_preview_prefers_attachment_name() {
        let mut msg = Message {
            id: "m1".into(),
            text: "see file".into(),
            sender_id: "u1".into(),
            sender_name: "Ann".into(),
            sender_profile_image: None,
            created_at: chrono::Utc::now(),
            issue_id: "T1".into(),
            file_url: Some("https://files/x/report.pdf".into()),
            file_name: Some("report.pdf".into()),
            file_upload_id: None,
            client_timestamp: None,
            is_optimistic: false,
        };
        assert_eq!(msg.preview(), "📎 report.pdf");
        msg.file_url = None;
        assert_eq!(msg.preview(), "see file");
    }

    #[test]
    fn credentials_debug_redacts_token() {
        let creds = Credentials {
            session: Session::new("u1", Role::User),
            token: Some("secret-token".into()),
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("[redacted]"));
    }
}
