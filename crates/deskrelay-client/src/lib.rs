// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Deskrelay client: one explicitly constructed service object per
//! signed-in session.
//!
//! [`RelayClient`] wires the connection manager, room manager, message engine
//! and notification aggregator together and routes inbound events between
//! them. [`SessionSupervisor`] builds and disposes clients as the session
//! changes.

pub mod client;
mod dispatch;
pub mod options;
pub mod subscription;
pub mod supervisor;

pub use client::RelayClient;
pub use options::{ClientOptions, credentials_from_config};
pub use subscription::Subscription;
pub use supervisor::{ClientFactory, SessionSupervisor};
