// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of messages, alerts and notifications.

use std::io::IsTerminal;

use colored::Colorize;

use deskrelay_core::{Alert, Message, Notification, NotificationType};

pub fn use_color(plain: bool) -> bool {
    !plain && std::io::stdout().is_terminal()
}

pub fn format_message(message: &Message, use_color: bool) -> String {
    let time = message.created_at.format("%Y-%m-%d %H:%M");
    let mut body = message.text.clone();
    if let Some(url) = &message.file_url {
        let name = message.file_name.as_deref().unwrap_or("attachment");
        if !body.is_empty() {
            body.push(' ');
        }
        body.push_str(&format!("[📎 {name}: {url}]"));
    }
    let pending = if message.is_optimistic { " (sending)" } else { "" };

    if use_color {
        format!(
            "{} {}: {body}{}",
            time.to_string().dimmed(),
            message.sender_name.bold(),
            pending.dimmed()
        )
    } else {
        format!("{time} {}: {body}{pending}", message.sender_name)
    }
}

fn level_label(level: NotificationType, use_color: bool) -> String {
    let label = format!("[{level}]");
    if !use_color {
        return label;
    }
    match level {
        NotificationType::Success => label.green().to_string(),
        NotificationType::Error => label.red().to_string(),
        NotificationType::Warning => label.yellow().to_string(),
        NotificationType::Info => label.blue().to_string(),
    }
}

pub fn format_alert(alert: &Alert, use_color: bool) -> String {
    match &alert.issue_id {
        Some(issue) => format!("{} {issue}: {}", level_label(alert.level, use_color), alert.text),
        None => format!("{} {}", level_label(alert.level, use_color), alert.text),
    }
}

pub fn format_notification(notification: &Notification, use_color: bool) -> String {
    let marker = if notification.read { " " } else { "*" };
    format!(
        "{marker} {} {} {}: {}",
        notification.created_at.format("%Y-%m-%d %H:%M"),
        level_label(notification.kind, use_color),
        notification.issue_id,
        notification.message
    )
}
