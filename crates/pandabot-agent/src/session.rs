// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Volatile session registry mapping (bot_id, chat_id) to session ids.
//!
//! Session ids are in-process only. A restart mints fresh ids while old
//! turns remain queryable in storage under their original session id.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::info;
use uuid::Uuid;

/// Maps each (bot_id, chat_id) pair to its live session id.
#[derive(Default)]
pub struct SessionRegistry {
    active: Mutex<HashMap<(String, String), String>>,
}

fn mint_session_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing session id for the pair, minting one on first use.
    pub fn get_or_create(&self, bot_id: &str, chat_id: &str) -> String {
        let key = (bot_id.to_string(), chat_id.to_string());
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = active.get(&key) {
            return existing.clone();
        }
        let session_id = mint_session_id();
        info!(bot_id, chat_id, session_id = %session_id, "session created");
        active.insert(key, session_id.clone());
        session_id
    }

    /// Unconditionally replaces the session id for the pair.
    pub fn reset(&self, bot_id: &str, chat_id: &str) -> String {
        let session_id = mint_session_id();
        info!(bot_id, chat_id, session_id = %session_id, "session reset");
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((bot_id.to_string(), chat_id.to_string()), session_id.clone());
        session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_stable_per_pair() {
        let registry = SessionRegistry::new();
        let first = registry.get_or_create("bot-1", "chat-1");
        let again = registry.get_or_create("bot-1", "chat-1");
        assert_eq!(first, again);
        assert_eq!(first.len(), 12);
    }

    #[test]
    fn distinct_pairs_get_distinct_sessions() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_create("bot-1", "chat-1");
        let b = registry.get_or_create("bot-1", "chat-2");
        let c = registry.get_or_create("bot-2", "chat-1");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn reset_replaces_the_session_id() {
        let registry = SessionRegistry::new();
        let before = registry.get_or_create("bot-1", "chat-1");
        let reset = registry.reset("bot-1", "chat-1");
        assert_ne!(before, reset);
        assert_eq!(registry.get_or_create("bot-1", "chat-1"), reset);
    }

    #[test]
    fn reset_without_prior_session_succeeds() {
        let registry = SessionRegistry::new();
        let id = registry.reset("bot-1", "chat-1");
        assert_eq!(id.len(), 12);
    }
}
