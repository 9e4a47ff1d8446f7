// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pandabot orchestration engine.
//!
//! Ties the backend-neutral pieces together: conversation assembly from
//! persisted turns, the dual-protocol tool loops, volatile session ids,
//! reply chunking, and the inbound message handler.

pub mod assembly;
pub mod chunk;
pub mod handler;
pub mod orchestrator;
pub mod session;

pub use assembly::build_messages;
pub use chunk::{split_message, MAX_CHUNK_LEN};
pub use handler::{IncomingMessage, MessageHandler};
pub use orchestrator::{
    OrchestrationRequest, Orchestrator, CANCELLED_MARKER, MAX_TOOL_ROUNDS, ROUND_LIMIT_MARKER,
};
pub use session::SessionRegistry;
