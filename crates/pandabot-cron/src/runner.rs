// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task re-entry: runs a prompt through the orchestration loop outside of
//! any live chat turn.

use std::sync::Arc;

use pandabot_agent::chunk::{split_message, MAX_CHUNK_LEN};
use pandabot_agent::orchestrator::{OrchestrationRequest, Orchestrator};
use pandabot_config::AgentConfig;
use pandabot_core::{
    ChatMessage, ConversationStore, Messenger, OutboundMessage, PandabotError, ToolContext, Turn,
    TurnRole,
};
use pandabot_tools::ToolRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const TASK_SYSTEM_PROMPT: &str =
    "You are a helpful assistant executing a scheduled task. Be concise.";

/// Runs scheduled prompts through the same orchestration loop and delivery
/// path as live chats.
///
/// Scheduled turns live under the synthetic session id
/// `scheduled_{bot_id}_{chat_id}`, kept apart from live sessions.
pub struct TaskRunner {
    orchestrator: Arc<Orchestrator>,
    registry: Arc<ToolRegistry>,
    store: Arc<dyn ConversationStore>,
    messenger: Arc<dyn Messenger>,
    config: AgentConfig,
}

impl TaskRunner {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn ConversationStore>,
        messenger: Arc<dyn Messenger>,
        config: AgentConfig,
    ) -> Self {
        Self {
            orchestrator,
            registry,
            store,
            messenger,
            config,
        }
    }

    /// Executes one scheduled task and delivers the outcome to the chat.
    ///
    /// Failures are converted into a delivered error message; this method
    /// never returns an error so a bad task cannot take down the scheduler.
    /// Returns the delivered text.
    pub async fn run_task(&self, bot_id: &str, chat_id: &str, task_prompt: &str) -> String {
        info!(bot_id, chat_id, "scheduled task started");
        let delivered = match self.execute(bot_id, chat_id, task_prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(bot_id, chat_id, error = %e, "scheduled task failed");
                format!("Scheduled task error: {e}")
            }
        };
        for chunk in split_message(&delivered, MAX_CHUNK_LEN) {
            if let Err(e) = self
                .messenger
                .send(OutboundMessage::text(chat_id, chunk))
                .await
            {
                warn!(chat_id, error = %e, "failed to deliver scheduled task result");
            }
        }
        delivered
    }

    async fn execute(
        &self,
        bot_id: &str,
        chat_id: &str,
        task_prompt: &str,
    ) -> Result<String, PandabotError> {
        let session_id = format!("scheduled_{bot_id}_{chat_id}");

        self.store
            .save_turn(&Turn::new(
                bot_id,
                &session_id,
                chat_id,
                TurnRole::User,
                task_prompt,
            ))
            .await?;

        let tools = self.registry.resolve(&self.config.tools);
        let context = ToolContext {
            bot_id: bot_id.to_string(),
            chat_id: chat_id.to_string(),
        };
        for tool in &tools {
            tool.bind_context(&context);
        }

        self.orchestrator
            .run(OrchestrationRequest {
                system: TASK_SYSTEM_PROMPT.to_string(),
                messages: vec![ChatMessage::user(task_prompt)],
                model: self.config.model.clone(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                tools,
                refusal_phrases: self.config.refusal_phrases.clone(),
                bot_id: bot_id.to_string(),
                session_id,
                chat_id: chat_id.to_string(),
                cancel: CancellationToken::new(),
            })
            .await
    }
}
