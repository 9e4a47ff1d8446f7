// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-tagged AI backend over the Claude Code CLI.
//!
//! Each call spawns the `claude` binary in non-interactive mode, pipes the
//! flattened conversation on stdin, and parses the JSON output. The CLI never
//! receives machine tool definitions; tool availability is described in the
//! system prompt and tool calls come back as tagged text. Subprocess failures
//! (timeout, non-zero exit, missing binary) surface as response text so the
//! user sees them in chat rather than a dropped message.

pub mod prompt;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use pandabot_core::{AiBackend, ChatRequest, ChatResponse, PandabotError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, info};

pub use crate::prompt::build_prompt;

/// Claude Code CLI backend.
pub struct ClaudeCliBackend {
    cli_path: PathBuf,
    timeout: Duration,
    allowed_tools: Vec<String>,
}

impl ClaudeCliBackend {
    pub fn new(cli_path: &str, timeout_secs: u64, allowed_tools: Vec<String>) -> Self {
        Self {
            cli_path: resolve_cli_path(cli_path),
            timeout: Duration::from_secs(timeout_secs),
            allowed_tools,
        }
    }

    pub fn cli_path(&self) -> &Path {
        &self.cli_path
    }

    async fn run_cli(&self, prompt: &str) -> Result<ChatResponse, PandabotError> {
        let mut cmd = Command::new(&self.cli_path);
        cmd.arg("-p")
            .args(["--output-format", "json"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Strip the API key so the CLI falls back to subscription auth.
            .env_remove("ANTHROPIC_API_KEY")
            .kill_on_drop(true);
        for tool_name in &self.allowed_tools {
            cmd.args(["--allowedTools", tool_name]);
        }

        info!(
            cli_path = %self.cli_path.display(),
            prompt_length = prompt.len(),
            "claude cli request"
        );

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!(cli_path = %self.cli_path.display(), "claude cli not found");
                return Ok(ChatResponse::text(format!(
                    "Claude Code CLI not found at '{}'. \
                     Install it with: npm install -g @anthropic-ai/claude-code",
                    self.cli_path.display()
                )));
            }
            Err(e) => {
                return Err(PandabotError::Backend {
                    message: format!("failed to spawn claude cli: {e}"),
                    source: Some(Box::new(e)),
                });
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| PandabotError::Backend {
                    message: format!("failed to write prompt to claude cli: {e}"),
                    source: Some(Box::new(e)),
                })?;
            // Close stdin so the CLI sees EOF.
            drop(stdin);
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| PandabotError::Backend {
                message: format!("failed to read claude cli output: {e}"),
                source: Some(Box::new(e)),
            })?,
            Err(_) => {
                error!(timeout_secs = self.timeout.as_secs(), "claude cli timed out");
                return Ok(ChatResponse::text(format!(
                    "Claude Code timed out after {} seconds.",
                    self.timeout.as_secs()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let exit = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            let detail = if !stderr.is_empty() {
                stderr.as_str()
            } else if !stdout.is_empty() {
                stdout.as_str()
            } else {
                "(no output)"
            };
            error!(exit = %exit, stderr = %stderr, "claude cli error");
            return Ok(ChatResponse::text(format!(
                "Claude Code error (exit {exit}): {detail}"
            )));
        }

        Ok(parse_response(&stdout))
    }
}

#[async_trait]
impl AiBackend for ClaudeCliBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, PandabotError> {
        let prompt = build_prompt(&request.system, &request.messages);
        self.run_cli(&prompt).await
    }

    fn supports_structured_tools(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str {
        "claude-code"
    }
}

/// Resolves the CLI binary, searching `PATH` when the configured value is
/// not an existing absolute path.
fn resolve_cli_path(cli_path: &str) -> PathBuf {
    let configured = Path::new(cli_path);
    if configured.is_absolute() && configured.exists() {
        return configured.to_path_buf();
    }

    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            let candidate = dir.join(cli_path);
            if candidate.is_file() {
                return candidate;
            }
        }
    }

    configured.to_path_buf()
}

/// Parses the CLI's `--output-format json` stdout.
///
/// The usual shape is a single object with a `result` field; a list of
/// stream events and plain text are accepted as fallbacks.
fn parse_response(output: &str) -> ChatResponse {
    match serde_json::from_str::<serde_json::Value>(output) {
        Ok(serde_json::Value::Object(map)) => {
            let text = map
                .get("result")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let input_tokens = map
                .get("input_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32;
            let output_tokens = map
                .get("output_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32;
            ChatResponse {
                text,
                input_tokens,
                output_tokens,
                blocks: Vec::new(),
            }
        }
        Ok(serde_json::Value::Array(items)) => {
            let texts: Vec<&str> = items
                .iter()
                .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("result"))
                .filter_map(|item| item.get("result").and_then(|r| r.as_str()))
                .collect();
            if texts.is_empty() {
                ChatResponse::text(serde_json::Value::Array(items).to_string())
            } else {
                ChatResponse::text(texts.join("\n"))
            }
        }
        _ => ChatResponse::text(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pandabot_core::ChatMessage;

    #[cfg(unix)]
    fn fake_cli(dir: &tempfile::TempDir, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join("claude");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn parse_object_output_extracts_result_and_tokens() {
        let resp =
            parse_response(r#"{"result": "hello", "input_tokens": 12, "output_tokens": 5}"#);
        assert_eq!(resp.text, "hello");
        assert_eq!(resp.input_tokens, 12);
        assert_eq!(resp.output_tokens, 5);
        assert!(resp.blocks.is_empty());
    }

    #[test]
    fn parse_array_output_joins_result_events() {
        let resp = parse_response(
            r#"[{"type": "system"}, {"type": "result", "result": "a"}, {"type": "result", "result": "b"}]"#,
        );
        assert_eq!(resp.text, "a\nb");
    }

    #[test]
    fn parse_plain_text_passes_through() {
        let resp = parse_response("not json at all");
        assert_eq!(resp.text, "not json at all");
    }

    #[test]
    fn resolve_falls_back_to_configured_path() {
        let resolved = resolve_cli_path("definitely-not-a-real-binary-xyz");
        assert_eq!(resolved, PathBuf::from("definitely-not-a-real-binary-xyz"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn chat_parses_json_from_fake_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_cli(
            &dir,
            r#"cat >/dev/null
echo '{"result": "Found 2 files", "input_tokens": 3, "output_tokens": 4}'"#,
        );
        let backend = ClaudeCliBackend::new(path.to_str().unwrap(), 30, vec![]);
        let resp = backend
            .chat(ChatRequest::new("sys", vec![ChatMessage::user("list files")]))
            .await
            .unwrap();
        assert_eq!(resp.text, "Found 2 files");
        assert_eq!(resp.output_tokens, 4);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn chat_reports_nonzero_exit_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_cli(
            &dir,
            r#"cat >/dev/null
echo "boom" >&2
exit 3"#,
        );
        let backend = ClaudeCliBackend::new(path.to_str().unwrap(), 30, vec![]);
        let resp = backend
            .chat(ChatRequest::new("", vec![ChatMessage::user("hi")]))
            .await
            .unwrap();
        assert_eq!(resp.text, "Claude Code error (exit 3): boom");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn chat_reports_timeout_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_cli(&dir, "sleep 10");
        let backend = ClaudeCliBackend::new(path.to_str().unwrap(), 1, vec![]);
        let resp = backend
            .chat(ChatRequest::new("", vec![ChatMessage::user("hi")]))
            .await
            .unwrap();
        assert_eq!(resp.text, "Claude Code timed out after 1 seconds.");
    }

    #[tokio::test]
    async fn chat_reports_missing_binary_as_text() {
        let backend = ClaudeCliBackend::new("/nonexistent/claude-cli-binary", 30, vec![]);
        let resp = backend
            .chat(ChatRequest::new("", vec![ChatMessage::user("hi")]))
            .await
            .unwrap();
        assert!(resp.text.starts_with("Claude Code CLI not found at"));
        assert!(resp.text.contains("npm install -g @anthropic-ai/claude-code"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn chat_pipes_prompt_on_stdin_and_passes_allowed_tools() {
        let dir = tempfile::tempdir().unwrap();
        // Echo argv and stdin back as the result so both are observable.
        let path = fake_cli(
            &dir,
            r#"input=$(cat)
printf '{"result": "args=%s stdin=%s"}' "$*" "$input""#,
        );
        let backend = ClaudeCliBackend::new(
            path.to_str().unwrap(),
            30,
            vec!["Bash".to_string(), "Read".to_string()],
        );
        let resp = backend
            .chat(ChatRequest::new("", vec![ChatMessage::user("ping")]))
            .await
            .unwrap();
        assert!(resp.text.contains("--allowedTools Bash"));
        assert!(resp.text.contains("--allowedTools Read"));
        assert!(resp.text.contains("[User]\nping"));
    }
}
