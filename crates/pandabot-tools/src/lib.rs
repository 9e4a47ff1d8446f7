// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool registry for the pandabot engine.
//!
//! The registry indexes [`Tool`] capabilities by name and resolves the
//! per-bot tool subset for the orchestration loops. Population of the
//! concrete capability set is host setup, not part of orchestration.

use std::collections::HashMap;
use std::sync::Arc;

use pandabot_core::{Tool, ToolDefinition};
use tracing::info;

/// Registry of available tools, indexed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registers a tool. The last registration for a name wins.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let replaced = self.tools.insert(name.clone(), tool).is_some();
        info!(tool_name = %name, replaced, "tool registered");
    }

    /// Looks up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Resolves a subset by name. Unknown names are silently dropped; the
    /// loop reports an unresolvable tool call as a runtime error instead.
    pub fn resolve(&self, names: &[String]) -> Vec<Arc<dyn Tool>> {
        names
            .iter()
            .filter_map(|n| self.tools.get(n).cloned())
            .collect()
    }

    /// Returns all registered tools.
    pub fn all(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    /// Builds API tool definitions for a resolved subset.
    pub fn definitions(tools: &[Arc<dyn Tool>]) -> Vec<ToolDefinition> {
        tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
