// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notifications for Deskrelay.
//!
//! - [`generator`] turns a status transition into localized text.
//! - [`change`] reads status transitions out of inbound payloads.
//! - [`NotificationAggregator`] owns the notification log and the per-ticket
//!   unread counters.

pub mod aggregator;
pub mod change;
pub mod generator;

pub use aggregator::{NotificationAggregator, TicketActivity};
pub use change::parse_status_change;
pub use generator::{Locale, StatusMessages, generate};
