// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured AI backend over the Anthropic Messages API.
//!
//! Implements [`AiBackend`] with full tool-use support: tool definitions are
//! forwarded on the request and tool invocation requests come back as typed
//! content blocks for the orchestration loop to execute.

pub mod client;
pub mod types;

use async_trait::async_trait;
use pandabot_core::{
    AiBackend, ChatMessage, ChatRequest, ChatResponse, ContentBlock, MessageContent,
    PandabotError, ResponseBlock,
};
use tracing::debug;

use crate::client::AnthropicClient;
use crate::types::{
    ApiContent, ApiContentBlock, ApiMessage, ImageSource, MessageRequest, ResponseContentBlock,
};

pub use crate::client::AnthropicClient as Client;

/// Anthropic Messages API backend.
pub struct AnthropicBackend {
    client: AnthropicClient,
}

impl AnthropicBackend {
    /// Creates a backend from API credentials.
    pub fn new(
        api_key: String,
        api_version: String,
        model: String,
    ) -> Result<Self, PandabotError> {
        Ok(Self {
            client: AnthropicClient::new(api_key, api_version, model)?,
        })
    }

    /// Creates a backend over an existing client (used by tests).
    pub fn with_client(client: AnthropicClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AiBackend for AnthropicBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, PandabotError> {
        let model = if request.model.is_empty() {
            self.client.default_model().to_string()
        } else {
            request.model.clone()
        };

        let api_request = MessageRequest {
            model,
            messages: request.messages.iter().map(to_api_message).collect(),
            system: (!request.system.is_empty()).then(|| request.system.clone()),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: (!request.tools.is_empty()).then(|| request.tools.clone()),
        };

        debug!(
            message_count = api_request.messages.len(),
            tool_count = request.tools.len(),
            "sending messages request"
        );

        let response = self.client.complete_message(&api_request).await?;

        let blocks: Vec<ResponseBlock> = response
            .content
            .into_iter()
            .map(|block| match block {
                ResponseContentBlock::Text { text } => ResponseBlock::Text { text },
                ResponseContentBlock::ToolUse { id, name, input } => {
                    ResponseBlock::ToolUse { id, name, input }
                }
            })
            .collect();

        // The caller branches on the presence of tool-use blocks, so the
        // text field carries the joined text only for block-free finals.
        let has_tool_uses = blocks
            .iter()
            .any(|b| matches!(b, ResponseBlock::ToolUse { .. }));
        let text = if has_tool_uses {
            String::new()
        } else {
            blocks
                .iter()
                .filter_map(|b| match b {
                    ResponseBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        debug!(
            stop_reason = ?response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "messages response received"
        );

        Ok(ChatResponse {
            text,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            blocks,
        })
    }

    fn supports_structured_tools(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        self.client.default_model()
    }
}

/// Converts a backend-neutral message into the Anthropic API shape.
fn to_api_message(msg: &ChatMessage) -> ApiMessage {
    let content = match &msg.content {
        MessageContent::Text(text) => ApiContent::Text(text.clone()),
        MessageContent::Blocks(blocks) => {
            ApiContent::Blocks(blocks.iter().map(to_api_block).collect())
        }
    };
    ApiMessage {
        role: msg.role.to_string(),
        content,
    }
}

fn to_api_block(block: &ContentBlock) -> ApiContentBlock {
    match block {
        ContentBlock::Text { text } => ApiContentBlock::Text { text: text.clone() },
        ContentBlock::Image { media_type, data } => ApiContentBlock::Image {
            source: ImageSource::base64(media_type.clone(), data.clone()),
        },
        ContentBlock::ToolUse { id, name, input } => ApiContentBlock::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: input.clone(),
        },
        ContentBlock::ToolResult {
            tool_use_id,
            content,
        } => ApiContentBlock::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: content.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pandabot_core::ChatRole;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> AnthropicBackend {
        let client = AnthropicClient::new(
            "test-key".into(),
            "2023-06-01".into(),
            "claude-sonnet-4-20250514".into(),
        )
        .unwrap()
        .with_base_url(server.uri());
        AnthropicBackend::with_client(client)
    }

    #[test]
    fn tool_messages_convert_to_block_content() {
        let msg = ChatMessage::blocks(
            ChatRole::Assistant,
            vec![
                ContentBlock::Text {
                    text: "Running it.".into(),
                },
                ContentBlock::ToolUse {
                    id: "toolu_1".into(),
                    name: "filesystem".into(),
                    input: serde_json::json!({"action": "list"}),
                },
            ],
        );
        let api = to_api_message(&msg);
        assert_eq!(api.role, "assistant");
        match api.content {
            ApiContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                assert!(matches!(blocks[1], ApiContentBlock::ToolUse { .. }));
            }
            ApiContent::Text(_) => panic!("expected blocks"),
        }
    }

    #[tokio::test]
    async fn chat_returns_empty_text_when_tool_use_present() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "toolu_1", "name": "browser", "input": {"action": "open"}}
            ],
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 7}
        });
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let resp = backend
            .chat(ChatRequest::new("sys", vec![ChatMessage::user("open it")]))
            .await
            .unwrap();

        assert!(resp.text.is_empty());
        assert!(resp.has_tool_uses());
        assert_eq!(resp.blocks.len(), 2);
        assert_eq!(resp.input_tokens, 12);
    }

    #[tokio::test]
    async fn chat_joins_text_blocks_for_final_responses() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "id": "msg_2",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Hello"},
                {"type": "text", "text": "world"}
            ],
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 3, "output_tokens": 2}
        });
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let resp = backend
            .chat(ChatRequest::new("", vec![ChatMessage::user("hi")]))
            .await
            .unwrap();
        assert_eq!(resp.text, "Hello\nworld");
        assert!(!resp.has_tool_uses());
    }

    #[tokio::test]
    async fn default_model_applied_when_request_model_empty() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "id": "msg_3",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "ok"}],
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1, "output_tokens": 1}
        });
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(
                serde_json::json!({"model": "claude-sonnet-4-20250514"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let resp = backend
            .chat(ChatRequest::new("", vec![ChatMessage::user("hi")]))
            .await;
        assert!(resp.is_ok());
    }
}
