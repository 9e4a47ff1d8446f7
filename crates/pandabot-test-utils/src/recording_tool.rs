// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable tool that counts executions and records inputs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pandabot_core::{Attachment, PandabotError, Tool, ToolContext};
use tokio::sync::Mutex;

/// A tool returning a fixed result, recording every invocation.
pub struct RecordingTool {
    name: String,
    result: String,
    fail: bool,
    executions: Arc<AtomicUsize>,
    inputs: Arc<Mutex<Vec<serde_json::Value>>>,
    contexts: Arc<Mutex<Vec<ToolContext>>>,
    pending_media: Arc<Mutex<Vec<Attachment>>>,
}

impl RecordingTool {
    pub fn new(name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: result.into(),
            fail: false,
            executions: Arc::new(AtomicUsize::new(0)),
            inputs: Arc::new(Mutex::new(Vec::new())),
            contexts: Arc::new(Mutex::new(Vec::new())),
            pending_media: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Makes `execute` return `Err(Tool(result))` instead of `Ok(result)`.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Queues media to be drained by `take_pending_media`.
    pub async fn stage_media(&self, attachment: Attachment) {
        self.pending_media.lock().await.push(attachment);
    }

    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub async fn inputs(&self) -> Vec<serde_json::Value> {
        self.inputs.lock().await.clone()
    }

    pub async fn bound_contexts(&self) -> Vec<ToolContext> {
        self.contexts.lock().await.clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "records its invocations for test assertions"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "additionalProperties": true
        })
    }

    async fn execute(&self, input: serde_json::Value) -> Result<String, PandabotError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().await.push(input);
        if self.fail {
            Err(PandabotError::Tool(self.result.clone()))
        } else {
            Ok(self.result.clone())
        }
    }

    fn bind_context(&self, ctx: &ToolContext) {
        if let Ok(mut contexts) = self.contexts.try_lock() {
            contexts.push(ctx.clone());
        }
    }

    fn take_pending_media(&self) -> Vec<Attachment> {
        match self.pending_media.try_lock() {
            Ok(mut media) => media.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }
}
