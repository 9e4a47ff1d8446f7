// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions for the orchestration engine.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod backend;
pub mod messenger;
pub mod storage;
pub mod tool;

pub use backend::AiBackend;
pub use messenger::Messenger;
pub use storage::ConversationStore;
pub use tool::{Tool, ToolContext};
