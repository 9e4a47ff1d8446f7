// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema creation. Idempotent; runs on every open.

use rusqlite::Connection;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS conversation_turns (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    bot_id          TEXT    NOT NULL,
    session_id      TEXT    NOT NULL,
    chat_id         TEXT    NOT NULL,
    role            TEXT    NOT NULL CHECK(role IN ('user','assistant','tool_use','tool_result')),
    content         TEXT    NOT NULL,
    model           TEXT    NOT NULL DEFAULT '',
    token_input     INTEGER NOT NULL DEFAULT 0,
    token_output    INTEGER NOT NULL DEFAULT 0,
    tool_name       TEXT,
    tool_call_id    TEXT,
    created_at      TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_turns_session
    ON conversation_turns(bot_id, session_id, created_at);

CREATE INDEX IF NOT EXISTS idx_turns_chat
    ON conversation_turns(bot_id, chat_id);

CREATE VIRTUAL TABLE IF NOT EXISTS conversation_fts USING fts5(
    content,
    content='conversation_turns',
    content_rowid='id',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS trg_fts_insert AFTER INSERT ON conversation_turns BEGIN
    INSERT INTO conversation_fts(rowid, content) VALUES (new.id, new.content);
END;

CREATE TRIGGER IF NOT EXISTS trg_fts_delete AFTER DELETE ON conversation_turns BEGIN
    INSERT INTO conversation_fts(conversation_fts, rowid, content)
    VALUES ('delete', old.id, old.content);
END;

CREATE TABLE IF NOT EXISTS sessions (
    bot_id          TEXT NOT NULL,
    session_id      TEXT NOT NULL,
    chat_id         TEXT NOT NULL,
    platform        TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    last_active_at  TEXT NOT NULL,
    metadata_json   TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (bot_id, session_id)
);
";

/// Applies the schema to a fresh or existing database.
pub fn apply(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
