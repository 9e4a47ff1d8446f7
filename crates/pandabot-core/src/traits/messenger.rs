// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery contract toward chat platform adapters.

use async_trait::async_trait;

use crate::error::PandabotError;
use crate::types::OutboundMessage;

/// Delivery surface the engine calls to emit results.
///
/// Platform connection management and inbound dispatch live in the adapter;
/// the engine only sends pre-chunked text and media.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends a message to a specific chat.
    async fn send(&self, message: OutboundMessage) -> Result<(), PandabotError>;

    /// Shows a typing/processing indicator.
    async fn send_typing(&self, chat_id: &str) -> Result<(), PandabotError>;

    /// Platform identifier string, e.g. "telegram".
    fn platform_name(&self) -> &str;
}
