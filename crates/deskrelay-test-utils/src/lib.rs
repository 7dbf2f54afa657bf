// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Deskrelay integration tests.
//!
//! Provides mock adapters and a test harness for fast, deterministic tests
//! without a realtime server or REST backend.
//!
//! # Components
//!
//! - [`MockTransport`] - Scripted realtime transport with event injection and emit capture
//! - [`MockTicketService`] - In-memory REST collaborator that records every call
//! - [`TestHarness`] - A `RelayClient` wired to both mocks

pub mod harness;
pub mod mock_service;
pub mod mock_transport;

pub use harness::{TestHarness, eventually};
pub use mock_service::MockTicketService;
pub use mock_transport::{AckReply, MockConnection, MockTransport};
