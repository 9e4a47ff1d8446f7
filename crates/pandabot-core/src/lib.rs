// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the pandabot tool-orchestration engine.
//!
//! Provides the error taxonomy, conversation/turn types, the backend-neutral
//! chat wire shape, and the collaborator traits implemented by backends,
//! stores, messengers, and tools.

pub mod error;
pub mod traits;
pub mod types;

pub use error::PandabotError;
pub use traits::{AiBackend, ConversationStore, Messenger, Tool, ToolContext};
pub use types::{
    Attachment, ChatMessage, ChatRequest, ChatResponse, ChatRole, ContentBlock, MessageContent,
    OutboundMessage, ResponseBlock, SessionInfo, ToolDefinition, Turn, TurnRole,
};
