// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports: `./pandabot.toml` > `~/.config/pandabot/pandabot.toml` with
//! environment variable overrides via the `PANDABOT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PandabotConfig;

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `~/.config/pandabot/pandabot.toml` (user config)
/// 3. `./pandabot.toml` (local directory)
/// 4. `PANDABOT_*` environment variables
pub fn load_config() -> Result<PandabotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PandabotConfig::default()))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("pandabot/pandabot.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("pandabot.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no file lookup).
///
/// Used for testing and embedded configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<PandabotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PandabotConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PandabotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PandabotConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment variable provider using explicit `map()` for section-to-dot
/// mapping. `PANDABOT_ANTHROPIC_API_KEY` must map to `anthropic.api_key`,
/// not `anthropic.api.key`, so `Env::split("_")` cannot be used.
fn env_provider() -> Env {
    Env::prefixed("PANDABOT_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("anthropic_", "anthropic.", 1)
            .replacen("claude_cli_", "claude_cli.", 1)
            .replacen("storage_", "storage.", 1);
        mapped.into()
    })
}
