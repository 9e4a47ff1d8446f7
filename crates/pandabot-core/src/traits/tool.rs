// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool capability trait: a named, schema-described unit of side-effecting
//! work invokable by the model, uniform across both backend variants.

use async_trait::async_trait;

use crate::error::PandabotError;
use crate::types::Attachment;

/// Per-invocation conversation context bound to a tool before execution.
///
/// Capabilities with session affinity (e.g. "which chat should a scheduled
/// task report to") receive this through [`Tool::bind_context`] immediately
/// before the loop runs, scoped to that processing unit.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub bot_id: String,
    pub chat_id: String,
}

/// A tool capability.
///
/// Implementations must be stateless from the loop's point of view: `execute`
/// takes the parsed JSON input from the model and returns a text result.
/// Execution faults are surfaced as `Err` and folded into a textual error
/// result by the loop rather than aborting the round.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name used for lookup and API serialization.
    fn name(&self) -> &str;

    /// Human-readable description for the model.
    fn description(&self) -> &str;

    /// JSON Schema describing accepted parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Runs the tool and returns a text result for the model.
    async fn execute(&self, input: serde_json::Value) -> Result<String, PandabotError>;

    /// Binds the current conversation context before execution. No-op by default.
    fn bind_context(&self, _ctx: &ToolContext) {}

    /// Drains media produced as a side effect (e.g. screenshots) for delivery
    /// to the user after the loop finishes. Empty by default.
    fn take_pending_media(&self) -> Vec<Attachment> {
        Vec::new()
    }
}
