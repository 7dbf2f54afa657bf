// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime event names exchanged with the server.

/// Announces the session identity after every (re)connect. Payload `{userId, role}`.
pub const USER_CONNECTED: &str = "userConnected";
/// Joins a ticket's room. Payload is the bare issue id.
pub const JOIN_ROOM: &str = "joinUserRoom";
/// Leaves a ticket's room. Payload is the bare issue id.
pub const LEAVE_ROOM: &str = "leaveUserRoom";
/// Sends a chat message, acknowledged with `{error?}`.
pub const SEND_MESSAGE: &str = "sendMessage";
/// Requests a ticket's history; the reply arrives on `responseEvent`.
pub const FETCH_MESSAGES: &str = "fetchMessages";
/// Outbound status change request and inbound room broadcast of one.
pub const REPORT_STATUS_UPDATE: &str = "reportStatusUpdate";

/// A chat message broadcast to a room.
pub const MESSAGE_RECEIVED: &str = "messageReceived";
/// Status change addressed to users.
pub const STATUS_UPDATE: &str = "statusUpdate";
/// Status change addressed to users (alternate spelling used by some server paths).
pub const ISSUE_STATUS_CHANGED: &str = "issue_status_changed";
/// Notifications stored while the client was offline.
pub const STORED_NOTIFICATIONS: &str = "storedNotifications";
/// Server-side error report. Payload `{message}`.
pub const ERROR: &str = "error";

/// Prefix of the one-shot reply channel used by [`FETCH_MESSAGES`].
pub const FETCH_MESSAGES_RESPONSE_PREFIX: &str = "fetchMessagesResponse_";
