// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messenger that records outbound messages for assertion.

use std::sync::Arc;

use async_trait::async_trait;
use pandabot_core::{Messenger, OutboundMessage, PandabotError};
use tokio::sync::Mutex;

/// Records everything sent through it; never fails.
pub struct MockMessenger {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    typing: Arc<Mutex<Vec<String>>>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            typing: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Messages delivered so far, in send order.
    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Chat ids that received a typing indicator.
    pub async fn typing_sent_to(&self) -> Vec<String> {
        self.typing.lock().await.clone()
    }
}

impl Default for MockMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send(&self, message: OutboundMessage) -> Result<(), PandabotError> {
        self.sent.lock().await.push(message);
        Ok(())
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), PandabotError> {
        self.typing.lock().await.push(chat_id.to_string());
        Ok(())
    }

    fn platform_name(&self) -> &str {
        "mock"
    }
}
