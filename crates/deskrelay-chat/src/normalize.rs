// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical form of inbound chat messages.
//!
//! Servers send the sender either as a nested user object or as flat
//! `senderId`/`senderName` fields, and several fields have alternate
//! spellings. This is the only place that knows about them.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use deskrelay_core::{DeskRelayError, Message};

pub const UNKNOWN_SENDER: &str = "Unknown sender";

/// A normalized message plus the client temp id it echoes, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub message: Message,
    pub temp_id: Option<String>,
}

/// Normalize a `messageReceived` payload. The payload must name its ticket.
pub fn normalize_message(payload: &Value) -> Result<IncomingMessage, DeskRelayError> {
    normalize_in(None, payload)
}

/// Normalize a history record, defaulting its ticket to `issue_id`.
pub(crate) fn normalize_history_record(
    issue_id: &str,
    payload: &Value,
) -> Result<IncomingMessage, DeskRelayError> {
    normalize_in(Some(issue_id), payload)
}

fn normalize_in(
    default_issue: Option<&str>,
    payload: &Value,
) -> Result<IncomingMessage, DeskRelayError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| DeskRelayError::InvalidPayload("message is not an object".to_string()))?;

    let issue_id = str_field(obj, &["issueId"])
        .or(default_issue)
        .ok_or_else(|| DeskRelayError::InvalidPayload("message has no issueId".to_string()))?
        .to_string();

    let (sender_id, sender_name, sender_profile_image) = match obj.get("senderId") {
        Some(Value::Object(sender)) => {
            let name = format!(
                "{} {}",
                str_field(sender, &["firstName"]).unwrap_or_default(),
                str_field(sender, &["lastName"]).unwrap_or_default()
            )
            .trim()
            .to_string();
            (
                str_field(sender, &["id", "_id"]).unwrap_or_default().to_string(),
                if name.is_empty() { UNKNOWN_SENDER.to_string() } else { name },
                str_field(sender, &["profileImage", "profilePicture"]).map(str::to_string),
            )
        }
        _ => (
            str_field(obj, &["senderId"]).unwrap_or_default().to_string(),
            str_field(obj, &["senderName"])
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(UNKNOWN_SENDER)
                .to_string(),
            str_field(obj, &["senderProfileImage", "profileImage", "profilePicture"])
                .map(str::to_string),
        ),
    };

    let file_url = str_field(obj, &["fileUrl", "file"]).map(str::to_string);
    let file_name = str_field(obj, &["fileName"]).map(str::to_string).or_else(|| {
        file_url
            .as_deref()
            .and_then(|url| url.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
    });

    let text = str_field(obj, &["message", "text"]).unwrap_or_default().to_string();
    let id = match str_field(obj, &["id", "_id"]) {
        Some(id) => id.to_string(),
        // History is fetched again on every reload; the id must not change.
        None if default_issue.is_some() => {
            let key = format!(
                "{issue_id}\n{sender_id}\n{}\n{text}\n{}",
                obj.get("createdAt").map(Value::to_string).unwrap_or_default(),
                file_url.as_deref().unwrap_or_default(),
            );
            let derived = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, key.as_bytes());
            format!("msg_{}", derived.simple())
        }
        None => format!("msg_{}", uuid::Uuid::new_v4().simple()),
    };

    let message = Message {
        id,
        text,
        sender_id,
        sender_name,
        sender_profile_image,
        created_at: obj.get("createdAt").and_then(parse_time).unwrap_or_else(Utc::now),
        issue_id,
        file_url,
        file_name,
        file_upload_id: str_field(obj, &["fileUploadId"]).map(str::to_string),
        client_timestamp: ["clientTimestamp", "_clientTimestamp"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(parse_millis)),
        is_optimistic: false,
    };

    Ok(IncomingMessage {
        message,
        temp_id: str_field(obj, &["tempId"]).map(str::to_string),
    })
}

/// First non-empty string among `keys`.
fn str_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(_) => value.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
