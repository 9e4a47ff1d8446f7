// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`ConversationStore`] implementation over SQLite with FTS5 search.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pandabot_core::{ConversationStore, PandabotError, SessionInfo, Turn, TurnRole};
use rusqlite::types::Type;
use rusqlite::{params, Row};
use tracing::debug;

use crate::database::Database;

/// SQLite-backed conversation store.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_turn(row: &Row<'_>) -> rusqlite::Result<Turn> {
    let role_raw: String = row.get(4)?;
    let role = TurnRole::from_str(&role_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let created_raw: String = row.get(11)?;
    Ok(Turn {
        id: Some(row.get(0)?),
        bot_id: row.get(1)?,
        session_id: row.get(2)?,
        chat_id: row.get(3)?,
        role,
        content: row.get(5)?,
        model: row.get(6)?,
        input_tokens: row.get(7)?,
        output_tokens: row.get(8)?,
        tool_name: row.get(9)?,
        tool_call_id: row.get(10)?,
        created_at: parse_ts(11, &created_raw)?,
    })
}

const TURN_COLUMNS: &str = "id, bot_id, session_id, chat_id, role, content, model, \
                            token_input, token_output, tool_name, tool_call_id, created_at";

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn save_turn(&self, turn: &Turn) -> Result<i64, PandabotError> {
        let turn = turn.clone();
        let id = self
            .db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO conversation_turns
                     (bot_id, session_id, chat_id, role, content, model,
                      token_input, token_output, tool_name, tool_call_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        turn.bot_id,
                        turn.session_id,
                        turn.chat_id,
                        turn.role.to_string(),
                        turn.content,
                        turn.model,
                        turn.input_tokens,
                        turn.output_tokens,
                        turn.tool_name,
                        turn.tool_call_id,
                        fmt_ts(turn.created_at),
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        debug!(turn_id = id, "turn saved");
        Ok(id)
    }

    async fn get_history(
        &self,
        bot_id: &str,
        session_id: &str,
    ) -> Result<Vec<Turn>, PandabotError> {
        let bot_id = bot_id.to_string();
        let session_id = session_id.to_string();
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {TURN_COLUMNS} FROM conversation_turns
                     WHERE bot_id = ?1 AND session_id = ?2
                     ORDER BY created_at ASC, id ASC"
                ))?;
                let rows = stmt.query_map(params![bot_id, session_id], row_to_turn)?;
                rows.collect()
            })
            .await
    }

    async fn search(
        &self,
        query: &str,
        bot_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Turn>, PandabotError> {
        let query = query.to_string();
        let bot_id = bot_id.map(str::to_string);
        let limit = limit as i64;
        self.db
            .call(move |conn| match bot_id {
                Some(bot_id) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT t.{} FROM conversation_turns t
                         JOIN conversation_fts f ON t.id = f.rowid
                         WHERE conversation_fts MATCH ?1 AND t.bot_id = ?2
                         ORDER BY rank LIMIT ?3",
                        TURN_COLUMNS.replace(", ", ", t.")
                    ))?;
                    let rows = stmt.query_map(params![query, bot_id, limit], row_to_turn)?;
                    rows.collect()
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT t.{} FROM conversation_turns t
                         JOIN conversation_fts f ON t.id = f.rowid
                         WHERE conversation_fts MATCH ?1
                         ORDER BY rank LIMIT ?2",
                        TURN_COLUMNS.replace(", ", ", t.")
                    ))?;
                    let rows = stmt.query_map(params![query, limit], row_to_turn)?;
                    rows.collect()
                }
            })
            .await
    }

    async fn upsert_session(
        &self,
        bot_id: &str,
        session_id: &str,
        chat_id: &str,
        platform: &str,
    ) -> Result<(), PandabotError> {
        let bot_id = bot_id.to_string();
        let session_id = session_id.to_string();
        let chat_id = chat_id.to_string();
        let platform = platform.to_string();
        let now = fmt_ts(Utc::now());
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions
                     (bot_id, session_id, chat_id, platform, created_at, last_active_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                     ON CONFLICT(bot_id, session_id)
                     DO UPDATE SET last_active_at = excluded.last_active_at",
                    params![bot_id, session_id, chat_id, platform, now],
                )?;
                Ok(())
            })
            .await
    }

    async fn list_sessions(&self, bot_id: &str) -> Result<Vec<SessionInfo>, PandabotError> {
        let bot_id = bot_id.to_string();
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT bot_id, session_id, chat_id, platform, created_at, last_active_at
                     FROM sessions WHERE bot_id = ?1
                     ORDER BY last_active_at DESC",
                )?;
                let rows = stmt.query_map(params![bot_id], |row| {
                    let created_raw: String = row.get(4)?;
                    let active_raw: String = row.get(5)?;
                    Ok(SessionInfo {
                        bot_id: row.get(0)?,
                        session_id: row.get(1)?,
                        chat_id: row.get(2)?,
                        platform: row.get(3)?,
                        created_at: parse_ts(4, &created_raw)?,
                        last_active_at: parse_ts(5, &active_raw)?,
                    })
                })?;
                rows.collect()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).unwrap();
        (SqliteStore::new(db), dir)
    }

    fn make_turn(session_id: &str, role: TurnRole, content: &str) -> Turn {
        Turn::new("bot-1", session_id, "chat-1", role, content)
    }

    #[tokio::test]
    async fn save_and_get_history_in_order() {
        let (store, _dir) = open_store().await;

        let id1 = store
            .save_turn(&make_turn("sess-1", TurnRole::User, "hello"))
            .await
            .unwrap();
        let id2 = store
            .save_turn(&make_turn("sess-1", TurnRole::Assistant, "hi there"))
            .await
            .unwrap();
        assert!(id2 > id1);

        let history = store.get_history("bot-1", "sess-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].role, TurnRole::Assistant);
        assert_eq!(history[0].id, Some(id1));
    }

    #[tokio::test]
    async fn history_is_scoped_to_bot_and_session() {
        let (store, _dir) = open_store().await;
        store
            .save_turn(&make_turn("sess-1", TurnRole::User, "one"))
            .await
            .unwrap();
        store
            .save_turn(&make_turn("sess-2", TurnRole::User, "two"))
            .await
            .unwrap();
        store
            .save_turn(&Turn::new("bot-2", "sess-1", "chat-9", TurnRole::User, "three"))
            .await
            .unwrap();

        let history = store.get_history("bot-1", "sess-1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "one");
    }

    #[tokio::test]
    async fn tool_turns_round_trip_metadata() {
        let (store, _dir) = open_store().await;
        let turn = make_turn("sess-1", TurnRole::ToolUse, r#"{"action":"list"}"#)
            .with_tool("filesystem", "toolu_1")
            .with_model("claude-sonnet-4-20250514")
            .with_tokens(12, 7);
        store.save_turn(&turn).await.unwrap();

        let history = store.get_history("bot-1", "sess-1").await.unwrap();
        assert_eq!(history[0].role, TurnRole::ToolUse);
        assert_eq!(history[0].tool_name.as_deref(), Some("filesystem"));
        assert_eq!(history[0].tool_call_id.as_deref(), Some("toolu_1"));
        assert_eq!(history[0].input_tokens, 12);
        assert_eq!(history[0].output_tokens, 7);
    }

    #[tokio::test]
    async fn full_text_search_finds_matching_turns() {
        let (store, _dir) = open_store().await;
        store
            .save_turn(&make_turn("sess-1", TurnRole::User, "the quick brown fox"))
            .await
            .unwrap();
        store
            .save_turn(&make_turn("sess-1", TurnRole::Assistant, "nothing relevant"))
            .await
            .unwrap();

        let hits = store.search("fox", None, 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "the quick brown fox");
    }

    #[tokio::test]
    async fn search_scopes_to_bot_when_given() {
        let (store, _dir) = open_store().await;
        store
            .save_turn(&make_turn("sess-1", TurnRole::User, "shared keyword apple"))
            .await
            .unwrap();
        store
            .save_turn(&Turn::new(
                "bot-2",
                "sess-x",
                "chat-x",
                TurnRole::User,
                "shared keyword apple",
            ))
            .await
            .unwrap();

        let all = store.search("apple", None, 20).await.unwrap();
        assert_eq!(all.len(), 2);
        let scoped = store.search("apple", Some("bot-2"), 20).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].bot_id, "bot-2");
    }

    #[tokio::test]
    async fn search_honors_limit() {
        let (store, _dir) = open_store().await;
        for i in 0..5 {
            store
                .save_turn(&make_turn("sess-1", TurnRole::User, &format!("banana {i}")))
                .await
                .unwrap();
        }
        let hits = store.search("banana", None, 3).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn upsert_session_creates_then_bumps_last_active() {
        let (store, _dir) = open_store().await;
        store
            .upsert_session("bot-1", "sess-1", "chat-1", "telegram")
            .await
            .unwrap();
        let before = store.list_sessions("bot-1").await.unwrap();
        assert_eq!(before.len(), 1);
        let first_active = before[0].last_active_at;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
            .upsert_session("bot-1", "sess-1", "chat-1", "telegram")
            .await
            .unwrap();
        let after = store.list_sessions("bot-1").await.unwrap();
        assert_eq!(after.len(), 1);
        assert!(after[0].last_active_at > first_active);
        assert_eq!(after[0].created_at, before[0].created_at);
    }

    #[tokio::test]
    async fn list_sessions_orders_most_recent_first() {
        let (store, _dir) = open_store().await;
        store
            .upsert_session("bot-1", "sess-a", "chat-1", "telegram")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
            .upsert_session("bot-1", "sess-b", "chat-2", "telegram")
            .await
            .unwrap();

        let sessions = store.list_sessions("bot-1").await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "sess-b");
        assert_eq!(sessions[1].session_id, "sess-a");
    }
}
