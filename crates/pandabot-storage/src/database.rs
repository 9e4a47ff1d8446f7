// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All access is serialized through a single background thread that owns the
//! `rusqlite::Connection`. Do NOT create additional Connection instances for
//! writes.

use std::path::Path;
use std::sync::mpsc;

use pandabot_core::PandabotError;
use rusqlite::Connection;
use tokio::sync::oneshot;
use tracing::info;

use crate::migrations;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Handle to the SQLite connection thread. Cloning shares the same thread.
#[derive(Clone)]
pub struct Database {
    sender: mpsc::Sender<Job>,
}

impl Database {
    /// Opens (or creates) the database at `path`, applies PRAGMAs and the
    /// schema, and starts the connection thread.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PandabotError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(storage_err)?;
            }
        }

        let mut conn = Connection::open(path).map_err(storage_err)?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))
            .map_err(storage_err)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(storage_err)?;
        migrations::apply(&conn).map_err(storage_err)?;

        let (sender, receiver) = mpsc::channel::<Job>();
        std::thread::Builder::new()
            .name("pandabot-sqlite".to_string())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job(&mut conn);
                }
                // Channel closed: all Database handles dropped.
            })
            .map_err(storage_err)?;

        info!(path = %path.display(), "database initialized");
        Ok(Self { sender })
    }

    /// Runs `f` on the connection thread and returns its result.
    pub async fn call<T, F>(&self, f: F) -> Result<T, PandabotError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Box::new(move |conn| {
                let _ = tx.send(f(conn));
            }))
            .map_err(|_| PandabotError::Internal("database thread has shut down".into()))?;
        rx.await
            .map_err(|_| PandabotError::Internal("database thread dropped the request".into()))?
            .map_err(storage_err)
    }
}

pub(crate) fn storage_err(e: impl std::error::Error + Send + Sync + 'static) -> PandabotError {
    PandabotError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema_and_serves_queries() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).unwrap();
        let count: i64 = db
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM conversation_turns", [], |row| {
                    row.get(0)
                })
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn open_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("test.db");
        let db = Database::open(&nested).unwrap();
        db.call(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .unwrap();
        assert!(nested.exists());
    }

    #[tokio::test]
    async fn clones_share_the_connection_thread() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).unwrap();
        let db2 = db.clone();
        db.call(|conn| {
            conn.execute_batch("CREATE TABLE scratch (v INTEGER)")?;
            conn.execute("INSERT INTO scratch (v) VALUES (7)", [])?;
            Ok(())
        })
        .await
        .unwrap();
        let v: i64 = db2
            .call(|conn| conn.query_row("SELECT v FROM scratch", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(v, 7);
    }
}
