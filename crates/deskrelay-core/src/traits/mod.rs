// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the collaborators the core talks to.
//!
//! Both seams use `#[async_trait]` for dynamic dispatch compatibility, so
//! production adapters and test mocks are interchangeable behind an `Arc<dyn _>`.

pub mod service;
pub mod transport;

pub use service::TicketService;
pub use transport::{Connection, Dialed, Transport};
