// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `deskrelay notifications` command implementation.

use deskrelay_client::RelayClient;
use deskrelay_core::DeskRelayError;

use crate::output::format_notification;

/// Run the `deskrelay notifications` command.
///
/// Uses REST only; no realtime connection is opened.
pub async fn run_notifications(
    client: &RelayClient,
    mark_all_read: bool,
    clear: bool,
    json: bool,
    use_color: bool,
) -> Result<(), DeskRelayError> {
    client.fetch_backlog().await?;

    if clear {
        client.clear_notifications().await?;
        println!("notifications cleared");
        return Ok(());
    }
    if mark_all_read {
        client.mark_all_read().await?;
    }

    let notifications = client.notifications().await;
    if json {
        let rendered = serde_json::to_string_pretty(&notifications).map_err(|e| {
            DeskRelayError::Internal(format!("failed to encode notifications: {e}"))
        })?;
        println!("{rendered}");
        return Ok(());
    }

    let unread = notifications.iter().filter(|n| !n.read).count();
    println!("{} notifications, {unread} unread", notifications.len());
    for notification in &notifications {
        println!("{}", format_notification(notification, use_color));
    }
    Ok(())
}
