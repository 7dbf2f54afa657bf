// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message ingestion for Deskrelay ticket conversations.
//!
//! Every inbound message, whether a live broadcast, the echo of our own send
//! or a history record, goes through [`normalize_message`] and then the
//! deduplication rules in [`dedup`]. The [`MessageEngine`] owns the per-ticket
//! chat logs and guarantees each message is represented exactly once.

pub mod dedup;
pub mod engine;
pub mod normalize;

pub use dedup::Decision;
pub use engine::{ChatSettings, MessageEngine, ReceiveOutcome, SendReceipt};
pub use normalize::{IncomingMessage, normalize_message};
