// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation store: no SQLite, no I/O, substring search.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pandabot_core::{ConversationStore, PandabotError, SessionInfo, Turn};
use tokio::sync::Mutex;

/// An in-memory [`ConversationStore`] for tests.
///
/// Search is a case-insensitive substring match rather than real FTS, which
/// is enough for orchestration tests that only assert what got persisted.
pub struct MemoryStore {
    turns: Arc<Mutex<Vec<Turn>>>,
    sessions: Arc<Mutex<Vec<SessionInfo>>>,
    /// When set, `save_turn` fails with this message.
    fail_saves: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            turns: Arc::new(Mutex::new(Vec::new())),
            sessions: Arc::new(Mutex::new(Vec::new())),
            fail_saves: Arc::new(Mutex::new(None)),
        }
    }

    /// All turns saved so far, in save order.
    pub async fn turns(&self) -> Vec<Turn> {
        self.turns.lock().await.clone()
    }

    /// Makes every subsequent `save_turn` fail, for persistence-failure tests.
    pub async fn fail_saves_with(&self, message: impl Into<String>) {
        *self.fail_saves.lock().await = Some(message.into());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn save_turn(&self, turn: &Turn) -> Result<i64, PandabotError> {
        if let Some(message) = self.fail_saves.lock().await.clone() {
            return Err(PandabotError::Internal(message));
        }
        let mut turns = self.turns.lock().await;
        let id = turns.len() as i64 + 1;
        let mut turn = turn.clone();
        turn.id = Some(id);
        turns.push(turn);
        Ok(id)
    }

    async fn get_history(
        &self,
        bot_id: &str,
        session_id: &str,
    ) -> Result<Vec<Turn>, PandabotError> {
        Ok(self
            .turns
            .lock()
            .await
            .iter()
            .filter(|t| t.bot_id == bot_id && t.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn search(
        &self,
        query: &str,
        bot_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Turn>, PandabotError> {
        let query = query.to_lowercase();
        Ok(self
            .turns
            .lock()
            .await
            .iter()
            .filter(|t| bot_id.is_none_or(|b| t.bot_id == b))
            .filter(|t| t.content.to_lowercase().contains(&query))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn upsert_session(
        &self,
        bot_id: &str,
        session_id: &str,
        chat_id: &str,
        platform: &str,
    ) -> Result<(), PandabotError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions
            .iter_mut()
            .find(|s| s.bot_id == bot_id && s.session_id == session_id)
        {
            existing.last_active_at = Utc::now();
        } else {
            let now = Utc::now();
            sessions.push(SessionInfo {
                bot_id: bot_id.to_string(),
                session_id: session_id.to_string(),
                chat_id: chat_id.to_string(),
                platform: platform.to_string(),
                created_at: now,
                last_active_at: now,
            });
        }
        Ok(())
    }

    async fn list_sessions(&self, bot_id: &str) -> Result<Vec<SessionInfo>, PandabotError> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .lock()
            .await
            .iter()
            .filter(|s| s.bot_id == bot_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        Ok(sessions)
    }
}
