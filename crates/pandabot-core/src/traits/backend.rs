// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI backend trait covering both structured and text-tagged variants.

use async_trait::async_trait;

use crate::error::PandabotError;
use crate::types::{ChatRequest, ChatResponse};

/// Uniform chat operation over the two backend variants.
///
/// - **Structured** backends receive machine tool definitions and may return
///   tool-use blocks interleaved with text; the caller runs the tool loop.
/// - **Text-tagged** backends never receive tool definitions; tool
///   availability is described in the system prompt and invocations come back
///   as `<tool_call>` tags embedded in plain text.
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Sends a conversation to the backend and returns its response.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, PandabotError>;

    /// Whether responses carry machine-readable tool invocation requests.
    ///
    /// Selects the orchestration strategy: `true` runs the structured loop,
    /// `false` the text-tagged loop.
    fn supports_structured_tools(&self) -> bool;

    /// Default model identifier for this backend.
    fn model_name(&self) -> &str;
}
