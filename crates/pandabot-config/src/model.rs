// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the pandabot engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Top-level pandabot configuration.
///
/// Loaded from TOML with environment variable overrides. All sections are
/// optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PandabotConfig {
    /// Bot identity and orchestration settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Anthropic Messages API settings (structured backend).
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Claude CLI subprocess settings (text-tagged backend).
    #[serde(default)]
    pub claude_cli: ClaudeCliConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Which AI backend drives the orchestration loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BackendKind {
    /// Anthropic Messages API: structured tool-use responses.
    Anthropic,
    /// Claude CLI subprocess: plain text with embedded tool-call tags.
    ClaudeCli,
}

/// Bot identity and orchestration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Bot identifier used in persisted turns.
    #[serde(default = "default_bot_id")]
    pub bot_id: String,

    /// Backend variant to use.
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Model identifier; empty means the backend default.
    #[serde(default)]
    pub model: String,

    /// Maximum tokens per model response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// System prompt prepended to every conversation.
    #[serde(default)]
    pub system_prompt: String,

    /// Names of the tools this bot may use (resolved against the registry).
    #[serde(default)]
    pub tools: Vec<String>,

    /// Assistant phrases treated as tool-capability refusals and rewritten
    /// before a text-tagged round (in-memory only, never persisted).
    #[serde(default = "default_refusal_phrases")]
    pub refusal_phrases: Vec<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bot_id: default_bot_id(),
            backend: default_backend(),
            model: String::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: String::new(),
            tools: Vec::new(),
            refusal_phrases: default_refusal_phrases(),
            log_level: default_log_level(),
        }
    }
}

/// Anthropic Messages API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// API key for authentication.
    #[serde(default)]
    pub api_key: String,

    /// API version header value.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Default model identifier.
    #[serde(default = "default_anthropic_model")]
    pub model: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_version: default_api_version(),
            model: default_anthropic_model(),
        }
    }
}

/// Claude CLI subprocess configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClaudeCliConfig {
    /// Executable name or absolute path.
    #[serde(default = "default_cli_path")]
    pub cli_path: String,

    /// Per-call subprocess timeout in seconds.
    #[serde(default = "default_cli_timeout_secs")]
    pub timeout_secs: u64,

    /// Values passed through as `--allowedTools` flags.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            timeout_secs: default_cli_timeout_secs(),
            allowed_tools: Vec::new(),
        }
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_bot_id() -> String {
    "pandabot".to_string()
}

fn default_backend() -> BackendKind {
    BackendKind::Anthropic
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_refusal_phrases() -> Vec<String> {
    [
        "I can't",
        "I cannot",
        "I don't have",
        "I'm not able",
        "no capability",
        "not supported",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_cli_path() -> String {
    "claude".to_string()
}

fn default_cli_timeout_secs() -> u64 {
    300
}

fn default_database_path() -> String {
    "pandabot.db".to_string()
}
