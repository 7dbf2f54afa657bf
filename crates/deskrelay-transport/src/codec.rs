// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON envelope for frames on the realtime socket.
//!
//! Event frame: `{"event": "<name>", "data": <json>, "ack": <id>?}`.
//! Ack reply:   `{"ack": <id>, "data": <json>}`.

use serde::Deserialize;
use serde_json::{Value, json};

use deskrelay_core::DeskRelayError;

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event {
        name: String,
        data: Value,
        /// Set when the server expects an acknowledgement.
        ack: Option<u64>,
    },
    Ack {
        id: u64,
        data: Value,
    },
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    ack: Option<u64>,
}

pub fn encode_event(name: &str, data: &Value, ack: Option<u64>) -> String {
    let mut frame = json!({ "event": name, "data": data });
    if let Some(id) = ack {
        frame["ack"] = json!(id);
    }
    frame.to_string()
}

pub fn encode_ack(id: u64, data: &Value) -> String {
    json!({ "ack": id, "data": data }).to_string()
}

pub fn decode(text: &str) -> Result<Frame, DeskRelayError> {
    let raw: RawFrame = serde_json::from_str(text)
        .map_err(|e| DeskRelayError::InvalidPayload(format!("malformed frame: {e}")))?;
    match (raw.event, raw.ack) {
        (Some(name), ack) => Ok(Frame::Event {
            name,
            data: raw.data,
            ack,
        }),
        (None, Some(id)) => Ok(Frame::Ack { id, data: raw.data }),
        (None, None) => Err(DeskRelayError::InvalidPayload(
            "frame has neither event nor ack".to_string(),
        )),
    }
}

/// Extracts the error carried by an acknowledgement payload, if any.
///
/// Servers reply `{error: "..."}`, `{error: {message}}` or `{error: true}`;
/// a missing, null or `false` error means success.
pub fn ack_error(ack: &Value) -> Option<String> {
    match ack.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => Some(
            obj.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
        ),
        Value::Bool(true) => Some("request failed".to_string()),
        other => Some(other.to_string()),
    }
}
