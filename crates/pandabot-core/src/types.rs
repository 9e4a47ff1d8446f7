// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the pandabot workspace: conversation turns,
//! sessions, attachments, and the backend-neutral chat wire shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Role of a persisted conversation turn.
///
/// `ToolUse`/`ToolResult` are produced only by the structured backend loop;
/// the text-tagged loop records its exchanges as plain `Assistant`/`User`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    ToolUse,
    ToolResult,
}

/// One immutable unit of conversation history.
///
/// Turns are append-only and ordered by `created_at`. Tool-use and tool-result
/// turns carry a `tool_call_id` correlating a request to its result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Row id assigned by the store; `None` before the turn is saved.
    pub id: Option<i64>,
    pub bot_id: String,
    pub session_id: String,
    pub chat_id: String,
    pub role: TurnRole,
    pub content: String,
    /// Model that produced this turn, empty for user turns.
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub tool_name: Option<String>,
    pub tool_call_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Creates a turn with the given role and content; token counts zero,
    /// no tool correlation.
    pub fn new(
        bot_id: impl Into<String>,
        session_id: impl Into<String>,
        chat_id: impl Into<String>,
        role: TurnRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            bot_id: bot_id.into(),
            session_id: session_id.into(),
            chat_id: chat_id.into(),
            role,
            content: content.into(),
            model: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            tool_name: None,
            tool_call_id: None,
            created_at: Utc::now(),
        }
    }

    /// Attaches the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Attaches token usage counts.
    pub fn with_tokens(mut self, input: u32, output: u32) -> Self {
        self.input_tokens = input;
        self.output_tokens = output;
        self
    }

    /// Attaches tool correlation metadata.
    pub fn with_tool(
        mut self,
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        self.tool_name = Some(tool_name.into());
        self.tool_call_id = Some(tool_call_id.into());
        self
    }
}

/// Metadata for a logical conversation session of one (bot, chat) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub bot_id: String,
    pub session_id: String,
    pub chat_id: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

/// Binary attachment carried by an inbound message for the duration of one
/// turn. Raw bytes are never persisted to the conversation store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub data: Vec<u8>,
    /// MIME type, e.g. "image/jpeg" or "text/plain".
    pub media_type: String,
    pub filename: String,
}

impl Attachment {
    pub fn new(data: Vec<u8>, media_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            data,
            media_type: media_type.into(),
            filename: filename.into(),
        }
    }
}

/// An outbound message handed to a [`crate::traits::Messenger`].
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub chat_id: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    pub fn text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

// --- Backend-neutral chat wire shape ---

/// Role of a chat message sent to an AI backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single message in the assembled conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn blocks(role: ChatRole, blocks: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content: MessageContent::Blocks(blocks),
        }
    }
}

/// Message content: a plain string or a list of typed blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A typed content block within an assembled message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// Inline base64-encoded image.
    Image {
        media_type: String,
        data: String,
    },
    /// A tool invocation requested by the assistant.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// The result of a tool invocation, correlated by id.
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// Tool definition forwarded to a structured backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    pub input_schema: serde_json::Value,
}

/// A request to an AI backend.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Model identifier; empty means the backend default.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Tool definitions; ignored by backends without structured tool support.
    pub tools: Vec<ToolDefinition>,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system: system.into(),
            messages,
            model: String::new(),
            max_tokens: 4096,
            temperature: 0.7,
            tools: Vec::new(),
        }
    }
}

/// A content block in a backend response, in original document order.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

/// Unified response from any AI backend.
///
/// For the structured variant, `text` is empty whenever `blocks` contains
/// tool-use requests; callers must branch on the blocks, not the text.
/// Text-tagged backends always return plain `text` and no blocks.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub blocks: Vec<ResponseBlock>,
}

impl ChatResponse {
    /// Builds a plain-text response with no token accounting.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            input_tokens: 0,
            output_tokens: 0,
            blocks: Vec::new(),
        }
    }

    /// Returns the tool-use blocks in document order.
    pub fn tool_uses(&self) -> Vec<&ResponseBlock> {
        self.blocks
            .iter()
            .filter(|b| matches!(b, ResponseBlock::ToolUse { .. }))
            .collect()
    }

    /// True if the response requests at least one tool invocation.
    pub fn has_tool_uses(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| matches!(b, ResponseBlock::ToolUse { .. }))
    }
}
