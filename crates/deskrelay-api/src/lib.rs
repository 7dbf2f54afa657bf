// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST adapter for the ticket service.
//!
//! [`HttpTicketService`] implements `TicketService` over HTTP with bearer
//! authentication and a single retry for transient failures on reads.

pub mod client;
mod types;

pub use client::HttpTicketService;
