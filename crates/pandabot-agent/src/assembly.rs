// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation assembly: stored turns to backend message lists.
//!
//! Consecutive `tool_use` turns merge into one assistant message and
//! consecutive `tool_result` turns into one user message, so the structured
//! backend always sees a request/result pairing it will accept. Attachments
//! on the current send are folded into the most recent user message.

use base64::Engine;
use pandabot_core::{Attachment, ChatMessage, ChatRole, ContentBlock, MessageContent, Turn, TurnRole};

/// MIME types treated as inlineable text besides the `text/` prefix.
const TEXTUAL_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/yaml",
    "application/x-yaml",
    "application/toml",
    "application/csv",
    "application/javascript",
];

/// Converts stored history into the backend message list.
///
/// `attachments` belong to the current send only; they are appended to the
/// most recent user message, converting its plain-text body into blocks.
pub fn build_messages(history: &[Turn], attachments: &[Attachment]) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = Vec::new();
    let mut i = 0;

    while i < history.len() {
        match history[i].role {
            TurnRole::User => {
                messages.push(ChatMessage::user(history[i].content.clone()));
                i += 1;
            }
            TurnRole::Assistant => {
                messages.push(ChatMessage::assistant(history[i].content.clone()));
                i += 1;
            }
            TurnRole::ToolUse => {
                let mut blocks = Vec::new();
                while i < history.len() && history[i].role == TurnRole::ToolUse {
                    let turn = &history[i];
                    let input = serde_json::from_str(&turn.content)
                        .unwrap_or_else(|_| serde_json::json!({}));
                    blocks.push(ContentBlock::ToolUse {
                        id: call_id(turn, i),
                        name: turn
                            .tool_name
                            .clone()
                            .unwrap_or_else(|| "unknown".to_string()),
                        input,
                    });
                    i += 1;
                }
                messages.push(ChatMessage::blocks(ChatRole::Assistant, blocks));
            }
            TurnRole::ToolResult => {
                let mut blocks = Vec::new();
                while i < history.len() && history[i].role == TurnRole::ToolResult {
                    let turn = &history[i];
                    blocks.push(ContentBlock::ToolResult {
                        tool_use_id: call_id(turn, i),
                        content: turn.content.clone(),
                    });
                    i += 1;
                }
                messages.push(ChatMessage::blocks(ChatRole::User, blocks));
            }
        }
    }

    if !attachments.is_empty() {
        append_attachments(&mut messages, attachments);
    }

    messages
}

/// Correlation id for a tool turn, with a positional fallback for legacy rows.
fn call_id(turn: &Turn, position: usize) -> String {
    turn.tool_call_id
        .clone()
        .unwrap_or_else(|| format!("tool_{position}"))
}

fn append_attachments(messages: &mut [ChatMessage], attachments: &[Attachment]) {
    let Some(target) = messages
        .iter_mut()
        .rev()
        .find(|m| m.role == ChatRole::User)
    else {
        return;
    };

    let mut blocks = match std::mem::replace(&mut target.content, MessageContent::Blocks(vec![])) {
        MessageContent::Text(text) => vec![ContentBlock::Text { text }],
        MessageContent::Blocks(blocks) => blocks,
    };
    for attachment in attachments {
        blocks.push(attachment_block(attachment));
    }
    target.content = MessageContent::Blocks(blocks);
}

fn attachment_block(attachment: &Attachment) -> ContentBlock {
    if attachment.media_type.starts_with("image/") {
        return ContentBlock::Image {
            media_type: attachment.media_type.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(&attachment.data),
        };
    }
    if is_textual(&attachment.media_type) {
        // Lossy decode: a bad byte becomes U+FFFD instead of failing the turn.
        let decoded = String::from_utf8_lossy(&attachment.data);
        return ContentBlock::Text {
            text: format!("[Attachment: {}]\n{decoded}", attachment.filename),
        };
    }
    ContentBlock::Text {
        text: format!(
            "[Attachment: {} ({}, {} bytes)]",
            attachment.filename,
            attachment.media_type,
            attachment.data.len()
        ),
    }
}

fn is_textual(media_type: &str) -> bool {
    media_type.starts_with("text/") || TEXTUAL_TYPES.contains(&media_type)
}
