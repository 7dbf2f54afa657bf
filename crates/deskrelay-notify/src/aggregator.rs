// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification log and per-ticket unread counters.
//!
//! Local state is updated first and the backing store is told afterwards.
//! Single-item remote updates are fire-and-forget; a failed clear-all
//! resynchronizes from the server.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use deskrelay_core::traits::TicketService;
use deskrelay_core::{
    Alert, DeskRelayError, Message, Notification, NotificationRecord, NotificationType, Session,
    StatusChange,
};

use crate::generator::StatusMessages;

/// Chat activity of one ticket as seen by this session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketActivity {
    pub unread_messages: u32,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

pub struct NotificationAggregator {
    session: Session,
    service: Arc<dyn TicketService>,
    messages: StatusMessages,
    /// Newest first.
    log: RwLock<Vec<Notification>>,
    activity: RwLock<HashMap<String, TicketActivity>>,
    alerts: broadcast::Sender<Alert>,
}

impl NotificationAggregator {
    pub fn new(
        session: Session,
        service: Arc<dyn TicketService>,
        messages: StatusMessages,
        alert_buffer: usize,
    ) -> Self {
        let (alerts, _) = broadcast::channel(alert_buffer.max(1));
        Self {
            session,
            service,
            messages,
            log: RwLock::new(Vec::new()),
            activity: RwLock::new(HashMap::new()),
            alerts,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }

    /// Show a transient alert to every subscriber.
    pub fn alert(&self, alert: Alert) {
        debug!(level = %alert.level, text = %alert.text, "alert");
        let _ = self.alerts.send(alert);
    }

    /// Plain `User` sessions only see notifications addressed to them.
    fn is_addressed(&self, user_id: Option<&str>) -> bool {
        self.session.role.sees_all_notifications() || user_id == Some(self.session.id.as_str())
    }

    fn build(&self, change: &StatusChange, read: bool) -> Notification {
        Notification {
            id: change
                .id
                .clone()
                .unwrap_or_else(|| format!("notif_{}", uuid::Uuid::new_v4().simple())),
            issue_id: change.issue_id.clone(),
            user_id: change.user_id.clone(),
            message: change
                .message
                .clone()
                .unwrap_or_else(|| self.messages.for_change(change)),
            kind: NotificationType::for_status(&change.new_status),
            old_status: change.old_status.clone(),
            new_status: Some(change.new_status.clone()),
            topic: change.topic.clone(),
            comment: change.comment.clone(),
            created_at: change.created_at.unwrap_or_else(Utc::now),
            read,
        }
    }

    /// Record a live status change, alert the user and persist it.
    ///
    /// `viewing` is whether the ticket's conversation is open right now; such
    /// notifications start out read. Returns the notification if it was
    /// delivered to this session.
    pub async fn on_status_changed(
        &self,
        change: &StatusChange,
        viewing: bool,
    ) -> Option<Notification> {
        if !self.is_addressed(change.user_id.as_deref()) {
            debug!(issue_id = %change.issue_id, "status change not addressed to this session");
            return None;
        }

        let notification = self.build(change, viewing);
        {
            let mut log = self.log.write().await;
            if log.iter().any(|n| n.id == notification.id) {
                debug!(id = %notification.id, "status change already recorded");
                return None;
            }
            log.insert(0, notification.clone());
        }

        self.alert(
            Alert::new(notification.kind, notification.message.clone())
                .for_issue(notification.issue_id.clone()),
        );

        let service = Arc::clone(&self.service);
        let to_save = notification.clone();
        tokio::spawn(async move {
            if let Err(e) = service.save_notification(&to_save).await {
                warn!(id = %to_save.id, error = %e, "failed to persist notification");
            }
        });

        Some(notification)
    }

    /// A status broadcast inside a ticket room: shown, not recorded.
    pub fn on_room_status_update(&self, change: &StatusChange) -> bool {
        if change.old_status.as_deref() == Some(change.new_status.as_str()) {
            return false;
        }
        if !self.is_addressed(change.user_id.as_deref()) {
            return false;
        }
        let notification = self.build(change, true);
        self.alert(
            Alert::new(notification.kind, notification.message).for_issue(notification.issue_id),
        );
        true
    }

    /// Pull notifications generated while offline and merge them in.
    pub async fn fetch_backlog(&self) -> Result<usize, DeskRelayError> {
        let records = self
            .service
            .fetch_notifications(&self.session.id)
            .await
            .inspect_err(|e| warn!(error = %e, "failed to fetch notification backlog"))?;
        Ok(self.merge_backlog(records).await)
    }

    /// Merge records pushed by the server (`storedNotifications`).
    pub async fn merge_stored(&self, payload: &Value) -> usize {
        let Some(items) = payload.as_array() else {
            debug!("stored notifications payload is not an array");
            return 0;
        };
        let records = items
            .iter()
            .filter_map(|item| {
                serde_json::from_value::<NotificationRecord>(item.clone())
                    .inspect_err(|e| debug!(error = %e, "skipping malformed stored notification"))
                    .ok()
            })
            .collect();
        self.merge_backlog(records).await
    }

    /// Merge by id, skipping ones already present. Emits one summary alert.
    pub async fn merge_backlog(&self, records: Vec<NotificationRecord>) -> usize {
        let incoming: Vec<Notification> = records.into_iter().map(Notification::from).collect();
        let added = {
            let mut log = self.log.write().await;
            let fresh = unseen(&log, incoming);
            let added = fresh.len();
            log.splice(0..0, fresh);
            added
        };

        if added > 0 {
            info!(added, "merged notification backlog");
            self.alert(Alert::new(
                NotificationType::Info,
                self.messages.backlog_summary(added),
            ));
        }
        added
    }

    pub async fn mark_all_read(&self) -> Result<(), DeskRelayError> {
        for n in self.log.write().await.iter_mut() {
            n.read = true;
        }
        self.service
            .mark_all_notifications_read(&self.session.id)
            .await
            .inspect_err(|e| warn!(error = %e, "failed to mark all notifications read"))
    }

    /// Flip one notification to read; the remote update runs in the background.
    pub async fn mark_read(&self, id: &str) -> bool {
        let found = {
            let mut log = self.log.write().await;
            match log.iter_mut().find(|n| n.id == id) {
                Some(n) => {
                    n.read = true;
                    true
                }
                None => false,
            }
        };
        if found {
            self.spawn_mark_read(id.to_string());
        }
        found
    }

    fn spawn_mark_read(&self, id: String) {
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            if let Err(e) = service.mark_notification_read(&id).await {
                warn!(id = %id, error = %e, "failed to mark notification read");
            }
        });
    }

    pub async fn remove(&self, id: &str) -> Result<(), DeskRelayError> {
        self.log.write().await.retain(|n| n.id != id);
        self.service
            .delete_notification(id)
            .await
            .inspect_err(|e| warn!(id, error = %e, "failed to delete notification"))
    }

    /// Clear the log. On failure the server's copy is fetched again.
    pub async fn clear_all(&self) -> Result<(), DeskRelayError> {
        self.log.write().await.clear();
        if let Err(e) = self.service.delete_all_notifications(&self.session.id).await {
            warn!(error = %e, "failed to clear notifications, resynchronizing");
            self.alert(Alert::new(NotificationType::Error, format!("Could not clear notifications: {e}")));
            if let Err(resync) = self.fetch_backlog().await {
                warn!(error = %resync, "resynchronization failed");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Note a chat message for unread and preview tracking.
    ///
    /// Messages sent by this session are ignored.
    pub async fn record_message(&self, message: &Message, viewing: bool) {
        if message.sender_id == self.session.id {
            return;
        }
        let mut activity = self.activity.write().await;
        let entry = activity.entry(message.issue_id.clone()).or_default();
        entry.last_message = Some(message.preview());
        entry.last_message_at = Some(message.created_at);
        if !viewing {
            entry.unread_messages += 1;
        }
    }

    /// Zero a ticket's unread count: its messages and its notifications.
    pub async fn reset_ticket(&self, issue_id: &str) {
        if let Some(entry) = self.activity.write().await.get_mut(issue_id) {
            entry.unread_messages = 0;
        }
        let flipped: Vec<String> = {
            let mut log = self.log.write().await;
            log.iter_mut()
                .filter(|n| n.issue_id == issue_id && !n.read)
                .map(|n| {
                    n.read = true;
                    n.id.clone()
                })
                .collect()
        };
        for id in flipped {
            self.spawn_mark_read(id);
        }
    }

    /// Seed a ticket's message counter from the server.
    pub async fn refresh_unread(&self, issue_id: &str) -> Result<u32, DeskRelayError> {
        let count = self.service.chat_unread_count(issue_id).await?;
        self.activity
            .write()
            .await
            .entry(issue_id.to_string())
            .or_default()
            .unread_messages = count;
        Ok(count)
    }

    /// Unread messages plus unread notifications for one ticket.
    pub async fn unread_count(&self, issue_id: &str) -> usize {
        let messages = self
            .activity
            .read()
            .await
            .get(issue_id)
            .map_or(0, |a| a.unread_messages as usize);
        let notifications = self
            .log
            .read()
            .await
            .iter()
            .filter(|n| n.issue_id == issue_id && !n.read)
            .count();
        messages + notifications
    }

    pub async fn unread_notifications(&self) -> usize {
        self.log.read().await.iter().filter(|n| !n.read).count()
    }

    /// Snapshot of the log, newest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.log.read().await.clone()
    }

    pub async fn activity(&self, issue_id: &str) -> Option<TicketActivity> {
        self.activity.read().await.get(issue_id).cloned()
    }
}

/// The incoming notifications whose ids are in neither `existing` nor earlier in the batch.
fn unseen(existing: &[Notification], incoming: Vec<Notification>) -> Vec<Notification> {
    let mut seen: HashSet<String> = existing.iter().map(|n| n.id.clone()).collect();
    incoming
        .into_iter()
        .filter(|n| seen.insert(n.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskrelay_core::Role;
    use deskrelay_test_utils::MockTicketService;
    use proptest::prelude::*;
    use serde_json::json;

    fn aggregator(role: Role, id: &str) -> (Arc<MockTicketService>, NotificationAggregator) {
        let service = Arc::new(MockTicketService::new());
        let agg = NotificationAggregator::new(
            Session::new(id, role),
            service.clone(),
            StatusMessages::default(),
            32,
        );
        (service, agg)
    }

    fn change(user: Option<&str>, new_status: &str) -> StatusChange {
        StatusChange {
            issue_id: "T1".into(),
            old_status: Some("pending".into()),
            new_status: new_status.into(),
            topic: Some("VPN access".into()),
            comment: Some("duplicate".into()),
            user_id: user.map(str::to_string),
            ..Default::default()
        }
    }

    fn message(issue: &str, sender: &str) -> Message {
        Message {
            id: format!("m-{issue}-{sender}"),
            text: "hello".into(),
            sender_id: sender.into(),
            sender_name: "Peer".into(),
            sender_profile_image: None,
            created_at: Utc::now(),
            issue_id: issue.into(),
            file_url: None,
            file_name: None,
            file_upload_id: None,
            client_timestamp: None,
            is_optimistic: false,
        }
    }

    #[tokio::test]
    async fn user_role_only_sees_own_notifications() {
        let (_, own) = aggregator(Role::User, "U1");
        let (_, other) = aggregator(Role::User, "U2");
        let (_, admin) = aggregator(Role::Admin, "A1");

        let c = change(Some("U1"), "rejected");
        assert!(own.on_status_changed(&c, false).await.is_some());
        assert!(other.on_status_changed(&c, false).await.is_none());
        assert!(admin.on_status_changed(&c, false).await.is_some());
        assert!(other.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn status_change_alerts_and_persists() {
        let (service, agg) = aggregator(Role::User, "U1");
        let mut alerts = agg.subscribe_alerts();

        let n = agg
            .on_status_changed(&change(Some("U1"), "rejected"), false)
            .await
            .unwrap();
        assert_eq!(n.message, "VPN access was rejected: duplicate");
        assert_eq!(n.kind, NotificationType::Error);
        assert!(!n.read);

        let alert = alerts.recv().await.unwrap();
        assert_eq!(alert.level, NotificationType::Error);
        assert_eq!(alert.issue_id.as_deref(), Some("T1"));

        service.wait_for_calls("save_notification", 1).await;
        assert_eq!(service.saved().await[0].id, n.id);
    }

    #[tokio::test]
    async fn viewing_ticket_starts_read() {
        let (_, agg) = aggregator(Role::Admin, "A1");
        let n = agg
            .on_status_changed(&change(None, "completed"), true)
            .await
            .unwrap();
        assert!(n.read);
        assert_eq!(n.kind, NotificationType::Success);
        assert_eq!(agg.unread_count("T1").await, 0);
    }

    #[tokio::test]
    async fn repeated_server_id_is_recorded_once() {
        let (_, agg) = aggregator(Role::Admin, "A1");
        let mut c = change(None, "approved");
        c.id = Some("n-7".into());
        assert!(agg.on_status_changed(&c, false).await.is_some());
        assert!(agg.on_status_changed(&c, false).await.is_none());
        assert_eq!(agg.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn room_update_alerts_without_recording() {
        let (service, agg) = aggregator(Role::Admin, "A1");
        let mut alerts = agg.subscribe_alerts();

        assert!(agg.on_room_status_update(&change(None, "approved")));
        let mut same = change(None, "pending");
        same.old_status = Some("pending".into());
        assert!(!agg.on_room_status_update(&same));

        assert_eq!(alerts.recv().await.unwrap().text, "VPN access has been approved");
        assert!(agg.notifications().await.is_empty());
        assert_eq!(service.call_count("save_notification").await, 0);
    }

    #[tokio::test]
    async fn backlog_merge_is_idempotent_with_single_summary() {
        let (service, agg) = aggregator(Role::User, "U1");
        service
            .set_notifications(vec![
                json!({"_id": "n1", "issueId": "T1", "message": "a"}),
                json!({"_id": "n2", "issueId": "T2", "message": "b", "isRead": true}),
            ])
            .await;
        let mut alerts = agg.subscribe_alerts();

        assert_eq!(agg.fetch_backlog().await.unwrap(), 2);
        assert_eq!(agg.fetch_backlog().await.unwrap(), 0);

        assert_eq!(agg.notifications().await.len(), 2);
        assert_eq!(alerts.recv().await.unwrap().text, "You have 2 new notifications");
        assert!(alerts.try_recv().is_err());
    }

    #[tokio::test]
    async fn stored_notifications_skip_malformed_records() {
        let (_, agg) = aggregator(Role::User, "U1");
        let added = agg
            .merge_stored(&json!([{"_id": "n1", "issueId": "T1"}, {"issueId": "no-id"}]))
            .await;
        assert_eq!(added, 1);
        assert_eq!(agg.merge_stored(&json!({"not": "an array"})).await, 0);
    }

    #[tokio::test]
    async fn clear_all_failure_resynchronizes() {
        let (service, agg) = aggregator(Role::User, "U1");
        service
            .set_notifications(vec![json!({"_id": "n1", "issueId": "T1"})])
            .await;
        agg.fetch_backlog().await.unwrap();
        service.fail("delete_all_notifications").await;

        assert!(agg.clear_all().await.is_err());
        let ids: Vec<String> = agg.notifications().await.into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["n1"]);
        assert_eq!(service.call_count("fetch_notifications").await, 2);
    }

    #[tokio::test]
    async fn single_item_failures_keep_optimistic_state() {
        let (service, agg) = aggregator(Role::User, "U1");
        service
            .set_notifications(vec![
                json!({"_id": "n1", "issueId": "T1"}),
                json!({"_id": "n2", "issueId": "T1"}),
            ])
            .await;
        agg.fetch_backlog().await.unwrap();
        service.fail("delete_notification").await;
        service.fail("mark_all_notifications_read").await;

        assert!(agg.remove("n1").await.is_err());
        assert!(agg.mark_all_read().await.is_err());
        let log = agg.notifications().await;
        assert_eq!(log.len(), 1);
        assert!(log[0].read);
    }

    #[tokio::test]
    async fn mark_read_updates_remote_in_background() {
        let (service, agg) = aggregator(Role::User, "U1");
        agg.merge_backlog(vec![serde_json::from_value(json!({"id": "n1"})).unwrap()])
            .await;

        assert!(agg.mark_read("n1").await);
        assert!(!agg.mark_read("missing").await);
        service.wait_for_calls("mark_notification_read", 1).await;
        assert_eq!(agg.unread_notifications().await, 0);
    }

    #[tokio::test]
    async fn unread_reset_is_per_ticket() {
        let (_, agg) = aggregator(Role::User, "U1");
        agg.record_message(&message("T1", "peer"), false).await;
        agg.record_message(&message("T1", "peer"), false).await;
        agg.record_message(&message("T1", "U1"), false).await;
        assert_eq!(agg.unread_count("T1").await, 2);

        agg.reset_ticket("T1").await;
        agg.record_message(&message("T2", "peer"), false).await;
        assert_eq!(agg.unread_count("T1").await, 0);
        assert_eq!(agg.unread_count("T2").await, 1);
    }

    #[tokio::test]
    async fn activity_tracks_peer_previews() {
        let (_, agg) = aggregator(Role::User, "U1");
        let mut msg = message("T1", "peer");
        msg.file_url = Some("https://files/T1/a.pdf".into());
        msg.file_name = Some("a.pdf".into());
        agg.record_message(&msg, true).await;

        let activity = agg.activity("T1").await.unwrap();
        assert_eq!(activity.last_message.as_deref(), Some("📎 a.pdf"));
        assert_eq!(activity.unread_messages, 0);
    }

    #[tokio::test]
    async fn refresh_unread_seeds_from_server() {
        let (service, agg) = aggregator(Role::User, "U1");
        service.set_unread("T3", 5).await;
        assert_eq!(agg.refresh_unread("T3").await.unwrap(), 5);
        assert_eq!(agg.unread_count("T3").await, 5);
    }

    fn notification(id: u8) -> Notification {
        Notification::from(
            serde_json::from_value::<NotificationRecord>(json!({"id": format!("n{id}")})).unwrap(),
        )
    }

    proptest! {
        #[test]
        fn merging_never_duplicates_ids(
            first in proptest::collection::vec(0u8..20, 0..15),
            second in proptest::collection::vec(0u8..20, 0..15),
        ) {
            let mut log: Vec<Notification> = Vec::new();
            for batch in [&first, &second, &first] {
                let fresh = unseen(&log, batch.iter().copied().map(notification).collect());
                log.splice(0..0, fresh);
            }
            let ids: HashSet<&str> = log.iter().map(|n| n.id.as_str()).collect();
            prop_assert_eq!(ids.len(), log.len());
            let expected: HashSet<u8> = first.iter().chain(second.iter()).copied().collect();
            prop_assert_eq!(log.len(), expected.len());
        }
    }
}
