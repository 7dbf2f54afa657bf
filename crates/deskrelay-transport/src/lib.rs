// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime transport layer for Deskrelay.
//!
//! - [`ConnectionManager`] owns the single live connection: authentication,
//!   identity announcement, bounded reconnection and teardown.
//! - [`RoomManager`] sends join/leave signals for per-ticket rooms and tracks
//!   which ticket is currently being viewed.
//! - [`WsTransport`] is the WebSocket implementation of the `Transport` trait.

pub mod codec;
pub mod manager;
pub mod rooms;
pub mod ws;

pub use codec::ack_error;
pub use manager::{ConnectionManager, ReconnectPolicy};
pub use rooms::RoomManager;
pub use ws::WsTransport;
