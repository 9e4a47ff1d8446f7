// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation flattening for the single-prompt CLI interface.

use pandabot_core::{ChatMessage, ChatRole, ContentBlock, MessageContent};

/// Flattens the system prompt and message history into one prompt string.
///
/// The CLI takes a single prompt on stdin, so each turn becomes a labeled
/// section. Tool-use and image blocks have no textual rendering and are
/// skipped.
pub fn build_prompt(system: &str, messages: &[ChatMessage]) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !system.is_empty() {
        parts.push(format!("[System Instructions]\n{system}\n"));
    }

    for msg in messages {
        match &msg.content {
            MessageContent::Text(text) => match msg.role {
                ChatRole::User => parts.push(format!("[User]\n{text}")),
                ChatRole::Assistant => parts.push(format!("[Assistant]\n{text}")),
            },
            MessageContent::Blocks(blocks) => {
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => {
                            parts.push(format!("[{}]\n{text}", role_label(msg.role)));
                        }
                        ContentBlock::ToolResult { content, .. } => {
                            parts.push(format!("[Tool Result]\n{content}"));
                        }
                        ContentBlock::Image { .. } | ContentBlock::ToolUse { .. } => {}
                    }
                }
            }
        }
    }

    parts.join("\n\n")
}

fn role_label(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "User",
        ChatRole::Assistant => "Assistant",
    }
}
