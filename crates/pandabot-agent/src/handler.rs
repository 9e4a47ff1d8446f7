// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound message handling: commands, session upkeep, and fire-and-forget
//! dispatch into the orchestration loop.
//!
//! Each inbound message is answered from a spawned task so the platform
//! adapter's receive loop stays responsive; `/stop` cancels the task
//! currently registered for the chat.

use std::collections::HashMap;
use std::sync::Arc;

use pandabot_config::AgentConfig;
use pandabot_core::{
    Attachment, ConversationStore, Messenger, OutboundMessage, ToolContext, Turn, TurnRole,
};
use pandabot_tools::ToolRegistry;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assembly::build_messages;
use crate::chunk::{split_message, MAX_CHUNK_LEN};
use crate::orchestrator::{OrchestrationRequest, Orchestrator};
use crate::session::SessionRegistry;

/// A message received from a platform adapter.
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    pub chat_id: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl IncomingMessage {
    pub fn text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// Entry point for inbound traffic of one bot.
pub struct MessageHandler {
    messenger: Arc<dyn Messenger>,
    orchestrator: Arc<Orchestrator>,
    registry: Arc<ToolRegistry>,
    store: Arc<dyn ConversationStore>,
    sessions: SessionRegistry,
    config: AgentConfig,
    /// Task currently answering each chat, keyed by chat id. A new message
    /// for the same chat overwrites the entry without cancelling the old
    /// task; only `/stop` cancels.
    running: Arc<Mutex<HashMap<String, (String, CancellationToken)>>>,
}

impl MessageHandler {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        orchestrator: Arc<Orchestrator>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn ConversationStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            messenger,
            orchestrator,
            registry,
            store,
            sessions: SessionRegistry::new(),
            config,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Handles one inbound message end to end.
    ///
    /// Commands are answered inline; everything else is dispatched to a
    /// spawned orchestration task and this method returns immediately.
    pub async fn handle(&self, message: IncomingMessage) {
        if message.text.is_empty() && message.attachments.is_empty() {
            return;
        }

        let text = message.text.trim();
        if text == "/reset" {
            self.cmd_reset(&message.chat_id).await;
            return;
        }
        if text == "/model" {
            self.cmd_model(&message.chat_id).await;
            return;
        }
        if let Some(query) = text.strip_prefix("/search") {
            self.cmd_search(&message.chat_id, query.trim()).await;
            return;
        }
        if text == "/stop" {
            self.cmd_stop(&message.chat_id).await;
            return;
        }

        self.dispatch(message).await;
    }

    async fn reply(&self, chat_id: &str, text: impl Into<String>) {
        if let Err(e) = self
            .messenger
            .send(OutboundMessage::text(chat_id, text))
            .await
        {
            warn!(chat_id, error = %e, "failed to send reply");
        }
    }

    async fn cmd_reset(&self, chat_id: &str) {
        let session_id = self.sessions.reset(&self.config.bot_id, chat_id);
        info!(chat_id, session_id = %session_id, "session reset");
        self.reply(chat_id, "Session reset. Starting fresh.").await;
    }

    async fn cmd_model(&self, chat_id: &str) {
        let model = if self.config.model.is_empty() {
            self.orchestrator.backend().model_name().to_string()
        } else {
            self.config.model.clone()
        };
        let tools = if self.config.tools.is_empty() {
            "none".to_string()
        } else {
            self.config.tools.join(", ")
        };
        let info = format!(
            "Bot: {}\nBackend: {}\nModel: {}\nTools: {}",
            self.config.bot_id, self.config.backend, model, tools,
        );
        self.reply(chat_id, info).await;
    }

    async fn cmd_search(&self, chat_id: &str, query: &str) {
        if query.is_empty() {
            self.reply(chat_id, "Usage: /search <query>").await;
            return;
        }
        match self
            .store
            .search(query, Some(self.config.bot_id.as_str()), 5)
            .await
        {
            Err(e) => {
                warn!(chat_id, error = %e, "search failed");
                self.reply(chat_id, format!("An error occurred: {e}")).await;
            }
            Ok(turns) if turns.is_empty() => {
                self.reply(chat_id, "No results found.").await;
            }
            Ok(turns) => {
                let lines: Vec<String> = turns
                    .iter()
                    .map(|t| {
                        let snippet: String = t.content.chars().take(200).collect();
                        format!("[{}] {}", t.role, snippet)
                    })
                    .collect();
                self.reply(
                    chat_id,
                    format!("Search results:\n\n{}", lines.join("\n---\n")),
                )
                .await;
            }
        }
    }

    async fn cmd_stop(&self, chat_id: &str) {
        let entry = self.running.lock().await.remove(chat_id);
        match entry {
            Some((task_id, cancel)) => {
                cancel.cancel();
                info!(chat_id, task_id = %task_id, "task cancellation requested");
                self.reply(chat_id, "Task cancelled.").await;
            }
            None => {
                self.reply(chat_id, "No task is currently running.").await;
            }
        }
    }

    async fn dispatch(&self, message: IncomingMessage) {
        let chat_id = message.chat_id.clone();
        let bot_id = self.config.bot_id.clone();

        if let Err(e) = self.messenger.send_typing(&chat_id).await {
            warn!(chat_id, error = %e, "failed to send typing indicator");
        }

        let session_id = self.sessions.get_or_create(&bot_id, &chat_id);
        if let Err(e) = self
            .store
            .upsert_session(
                &bot_id,
                &session_id,
                &chat_id,
                self.messenger.platform_name(),
            )
            .await
        {
            warn!(chat_id, error = %e, "failed to upsert session");
        }

        // Attachment bytes are never persisted; the turn records a
        // placeholder so the history stays coherent.
        let saved_content = if message.attachments.is_empty() {
            message.text.clone()
        } else if message.text.is_empty() {
            "[Image]".to_string()
        } else {
            format!("[Image] {}", message.text)
        };
        let user_turn = Turn::new(
            &bot_id,
            &session_id,
            &chat_id,
            TurnRole::User,
            &saved_content,
        );
        if let Err(e) = self.store.save_turn(&user_turn).await {
            warn!(chat_id, error = %e, "failed to persist user turn");
        }

        let history = match self.store.get_history(&bot_id, &session_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(chat_id, error = %e, "failed to load history");
                vec![user_turn]
            }
        };
        let messages = build_messages(&history, &message.attachments);

        let tools = self.registry.resolve(&self.config.tools);
        let context = ToolContext {
            bot_id: bot_id.clone(),
            chat_id: chat_id.clone(),
        };
        for tool in &tools {
            tool.bind_context(&context);
        }

        let cancel = CancellationToken::new();
        let task_id = Uuid::new_v4().simple().to_string()[..12].to_string();
        self.running
            .lock()
            .await
            .insert(chat_id.clone(), (task_id.clone(), cancel.clone()));

        let request = OrchestrationRequest {
            system: self.config.system_prompt.clone(),
            messages,
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            tools: tools.clone(),
            refusal_phrases: self.config.refusal_phrases.clone(),
            bot_id,
            session_id,
            chat_id: chat_id.clone(),
            cancel,
        };

        let orchestrator = self.orchestrator.clone();
        let messenger = self.messenger.clone();
        let running = self.running.clone();
        tokio::spawn(async move {
            let reply = match orchestrator.run(request).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(chat_id = %chat_id, error = %e, "orchestration failed");
                    format!("An error occurred: {e}")
                }
            };

            for chunk in split_message(&reply, MAX_CHUNK_LEN) {
                if let Err(e) = messenger
                    .send(OutboundMessage::text(&chat_id, chunk))
                    .await
                {
                    warn!(chat_id = %chat_id, error = %e, "failed to send reply chunk");
                }
            }

            // Media produced by tools during the run is delivered as one
            // trailing message with empty text.
            let media: Vec<Attachment> = tools
                .iter()
                .flat_map(|t| t.take_pending_media())
                .collect();
            if !media.is_empty() {
                let message = OutboundMessage {
                    chat_id: chat_id.clone(),
                    text: String::new(),
                    attachments: media,
                };
                if let Err(e) = messenger.send(message).await {
                    warn!(chat_id = %chat_id, error = %e, "failed to send media");
                }
            }

            // Drop the registration unless a newer task replaced it.
            let mut running = running.lock().await;
            if running.get(&chat_id).is_some_and(|(id, _)| *id == task_id) {
                running.remove(&chat_id);
            }
        });
    }
}
