// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for conversation history and session metadata.
//!
//! Turns are append-only; an FTS5 index over turn content backs the `/search`
//! command. All access goes through a single connection thread.

pub mod database;
pub mod migrations;
pub mod store;

pub use database::Database;
pub use store::SqliteStore;
