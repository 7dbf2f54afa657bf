// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios over the full client stack with mock collaborators.

use serde_json::json;

use deskrelay_core::{NotificationType, Role, events};
use deskrelay_notify::generate;
use deskrelay_test_utils::{AckReply, TestHarness, eventually};

#[tokio::test]
async fn send_echo_then_rejection() {
    let h = TestHarness::builder()
        .with_user("U1", Role::User)
        .with_display_name("Ada")
        .build()
        .await;

    let receipt = h.client.send_message("T1", "hello", None).await.unwrap();
    let optimistic = h.client.messages("T1");
    assert_eq!(optimistic.len(), 1);
    assert!(optimistic[0].is_optimistic);
    assert_eq!(optimistic[0].id, receipt.temp_id);

    h.inject(
        events::MESSAGE_RECEIVED,
        json!({
            "id": "m1",
            "issueId": "T1",
            "message": "hello",
            "senderId": "U1",
            "senderName": "Ada",
            "tempId": receipt.temp_id,
        }),
    )
    .await;
    eventually("echo reconciliation", || async {
        h.client.messages("T1").first().is_some_and(|m| !m.is_optimistic)
    })
    .await;

    let log = h.client.messages("T1");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].id, "m1");
    // Own echo does not count as unread.
    assert_eq!(h.client.unread_count("T1").await, 0);

    h.inject(
        events::STATUS_UPDATE,
        json!({
            "issueId": "T1",
            "oldStatus": "pending",
            "status": "rejected",
            "topic": "VPN access",
            "comment": "duplicate",
            "userId": "U1",
        }),
    )
    .await;
    eventually("status notification", || async { !h.client.notifications().await.is_empty() })
        .await;

    let notification = &h.client.notifications().await[0];
    assert_eq!(notification.message, "VPN access was rejected: duplicate");
    assert_eq!(
        notification.message,
        generate("pending", "rejected", "VPN access", Some("duplicate"))
    );
    assert_eq!(notification.kind, NotificationType::Error);
    assert!(!notification.read);
    assert_eq!(h.client.unread_count("T1").await, 1);
}

#[tokio::test]
async fn rejected_send_leaves_log_unchanged() {
    let h = TestHarness::builder().build().await;
    h.inject(
        events::MESSAGE_RECEIVED,
        json!({"id": "m0", "issueId": "T1", "message": "earlier", "senderId": "U9"}),
    )
    .await;
    eventually("peer message", || async { h.client.messages("T1").len() == 1 }).await;

    h.transport
        .push_ack(events::SEND_MESSAGE, AckReply::Value(json!({"error": "closed"})))
        .await;
    assert!(h.client.send_message("T1", "hello", None).await.is_err());
    assert_eq!(h.client.messages("T1").len(), 1);
}

#[tokio::test]
async fn backlog_refetch_never_duplicates() {
    let h = TestHarness::builder().unstarted().build().await;
    h.service
        .set_notifications(vec![
            json!({"_id": "n1", "issueId": "T1"}),
            json!({"_id": "n2", "issueId": "T2"}),
        ])
        .await;
    assert_eq!(h.client.fetch_backlog().await.unwrap(), 2);

    h.service
        .set_notifications(vec![
            json!({"_id": "n2", "issueId": "T2"}),
            json!({"_id": "n3", "issueId": "T3"}),
        ])
        .await;
    assert_eq!(h.client.fetch_backlog().await.unwrap(), 1);

    let mut ids: Vec<String> = h.client.notifications().await.into_iter().map(|n| n.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["n1", "n2", "n3"]);
}

#[tokio::test]
async fn viewing_resets_unread_independently_per_ticket() {
    let h = TestHarness::builder().build().await;
    for id in ["a", "b"] {
        h.inject(
            events::MESSAGE_RECEIVED,
            json!({"id": id, "issueId": "T1", "message": id, "senderId": "U9"}),
        )
        .await;
    }
    eventually("unread T1", || async { h.client.unread_count("T1").await == 2 }).await;

    h.client.mark_chat_read("T1").await;
    assert_eq!(h.client.unread_count("T1").await, 0);

    h.inject(
        events::MESSAGE_RECEIVED,
        json!({"id": "c", "issueId": "T2", "message": "other", "senderId": "U9"}),
    )
    .await;
    eventually("unread T2", || async { h.client.unread_count("T2").await == 1 }).await;
    assert_eq!(h.client.unread_count("T1").await, 0);
}

#[tokio::test]
async fn duplicate_attachment_delivery_collapses() {
    let h = TestHarness::builder().build().await;
    let base = json!({"issueId": "T1", "senderId": "U9", "fileUrl": "https://files.test/T1/x.png"});
    for (id, ts) in [("f1", 1_000), ("f2", 5_999), ("f3", 6_001)] {
        let mut event = base.clone();
        event["id"] = json!(id);
        event["clientTimestamp"] = json!(ts);
        h.inject(events::MESSAGE_RECEIVED, event).await;
    }
    eventually("attachments", || async {
        h.client.messages("T1").last().is_some_and(|m| m.id == "f3")
    })
    .await;
    let ids: Vec<String> = h.client.messages("T1").into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["f1", "f3"]);
}
