// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence contract for conversation history.

use async_trait::async_trait;

use crate::error::PandabotError;
use crate::types::{SessionInfo, Turn};

/// Read/write contract over the conversation store.
///
/// Implementations serialize their own writes; the orchestration loops hold no
/// lock across calls and may invoke the store concurrently from multiple chats.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends a turn and returns its assigned row id.
    async fn save_turn(&self, turn: &Turn) -> Result<i64, PandabotError>;

    /// Returns all turns for a session in time-ascending order.
    async fn get_history(
        &self,
        bot_id: &str,
        session_id: &str,
    ) -> Result<Vec<Turn>, PandabotError>;

    /// Full-text search across turn content, optionally scoped to one bot.
    async fn search(
        &self,
        query: &str,
        bot_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Turn>, PandabotError>;

    /// Creates session metadata or bumps its last-active timestamp.
    async fn upsert_session(
        &self,
        bot_id: &str,
        session_id: &str,
        chat_id: &str,
        platform: &str,
    ) -> Result<(), PandabotError>;

    /// Lists session metadata for a bot, most recently active first.
    async fn list_sessions(&self, bot_id: &str) -> Result<Vec<SessionInfo>, PandabotError>;
}
