// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool capability exposing the scheduler to the model.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pandabot_core::{PandabotError, Tool, ToolContext};

use crate::service::SchedulerService;

/// Lets the model schedule, list, and remove tasks for the chat it is
/// currently serving.
///
/// The handler binds the chat context before the loop runs; jobs created
/// here deliver into that same chat.
pub struct SchedulerTool {
    service: Arc<SchedulerService>,
    context: Mutex<Option<ToolContext>>,
}

impl SchedulerTool {
    pub fn new(service: Arc<SchedulerService>) -> Self {
        Self {
            service,
            context: Mutex::new(None),
        }
    }

    fn current_context(&self) -> Result<ToolContext, PandabotError> {
        self.context
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| {
                PandabotError::Tool("scheduler used outside of a chat context".to_string())
            })
    }
}

fn required_str<'a>(input: &'a serde_json::Value, key: &str) -> Result<&'a str, PandabotError> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PandabotError::Tool(format!("missing required parameter '{key}'")))
}

#[async_trait]
impl Tool for SchedulerTool {
    fn name(&self) -> &str {
        "scheduler"
    }

    fn description(&self) -> &str {
        "Schedule tasks to run later: recurring cron jobs, one-time reminders, \
         listing and removing scheduled tasks."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["add_cron", "add_once", "list", "remove"],
                    "description": "What to do"
                },
                "cron": {
                    "type": "string",
                    "description": "5-field cron expression, e.g. '0 9 * * *' (add_cron)"
                },
                "time": {
                    "type": "string",
                    "description": "RFC 3339 timestamp, e.g. '2026-09-01T09:00:00Z' (add_once)"
                },
                "prompt": {
                    "type": "string",
                    "description": "Task prompt to run when the job fires"
                },
                "job_id": {
                    "type": "string",
                    "description": "Job id to remove (remove)"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> Result<String, PandabotError> {
        let action = required_str(&input, "action")?;
        match action {
            "add_cron" => {
                let ctx = self.current_context()?;
                let cron = required_str(&input, "cron")?;
                let prompt = required_str(&input, "prompt")?;
                let id = self
                    .service
                    .add_cron_job(&ctx.bot_id, &ctx.chat_id, cron, prompt)
                    .await?;
                Ok(format!("Scheduled recurring task {id} ({cron}): {prompt}"))
            }
            "add_once" => {
                let ctx = self.current_context()?;
                let time = required_str(&input, "time")?;
                let prompt = required_str(&input, "prompt")?;
                let at: DateTime<Utc> = DateTime::parse_from_rfc3339(time)
                    .map_err(|e| {
                        PandabotError::Tool(format!("invalid RFC 3339 time '{time}': {e}"))
                    })?
                    .with_timezone(&Utc);
                let id = self
                    .service
                    .add_once_job(&ctx.bot_id, &ctx.chat_id, at, prompt)
                    .await?;
                Ok(format!("Scheduled one-time task {id} at {at}: {prompt}"))
            }
            "list" => {
                let ctx = self.current_context()?;
                let jobs = self.service.list_jobs().await;
                let lines: Vec<String> = jobs
                    .iter()
                    .filter(|j| j.bot_id == ctx.bot_id && j.chat_id == ctx.chat_id)
                    .map(|j| {
                        let kind = if j.recurring { "recurring" } else { "one-time" };
                        format!("{}: {} ({kind}, next run {})", j.id, j.prompt, j.next_run)
                    })
                    .collect();
                if lines.is_empty() {
                    Ok("No scheduled tasks.".to_string())
                } else {
                    Ok(lines.join("\n"))
                }
            }
            "remove" => {
                let job_id = required_str(&input, "job_id")?;
                if self.service.remove_job(job_id).await {
                    Ok(format!("Removed task {job_id}"))
                } else {
                    Ok(format!("No task with id {job_id}"))
                }
            }
            other => Err(PandabotError::Tool(format!("unknown action '{other}'"))),
        }
    }

    fn bind_context(&self, ctx: &ToolContext) {
        *self.context.lock().unwrap_or_else(|e| e.into_inner()) = Some(ctx.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::TaskRunner;
    use pandabot_agent::orchestrator::Orchestrator;
    use pandabot_config::AgentConfig;
    use pandabot_test_utils::{MemoryStore, MockBackend, MockMessenger};
    use pandabot_tools::ToolRegistry;

    fn tool() -> (SchedulerTool, Arc<SchedulerService>) {
        let registry = Arc::new(ToolRegistry::new());
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(MockBackend::new()),
            registry.clone(),
            store.clone(),
        ));
        let runner = Arc::new(TaskRunner::new(
            orchestrator,
            registry,
            store,
            Arc::new(MockMessenger::new()),
            AgentConfig::default(),
        ));
        let service = Arc::new(SchedulerService::new(runner));
        (SchedulerTool::new(service.clone()), service)
    }

    fn bound_tool() -> (SchedulerTool, Arc<SchedulerService>) {
        let (tool, service) = tool();
        tool.bind_context(&ToolContext {
            bot_id: "pandabot".to_string(),
            chat_id: "c1".to_string(),
        });
        (tool, service)
    }

    #[tokio::test]
    async fn add_once_creates_a_job_for_the_bound_chat() {
        let (tool, service) = bound_tool();
        let result = tool
            .execute(serde_json::json!({
                "action": "add_once",
                "time": "2027-01-01T09:00:00Z",
                "prompt": "happy new year"
            }))
            .await
            .unwrap();
        assert!(result.starts_with("Scheduled one-time task "));

        let jobs = service.list_jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].chat_id, "c1");
        assert_eq!(jobs[0].prompt, "happy new year");
    }

    #[tokio::test]
    async fn add_cron_then_list_and_remove() {
        let (tool, _service) = bound_tool();
        let added = tool
            .execute(serde_json::json!({
                "action": "add_cron",
                "cron": "0 9 * * *",
                "prompt": "morning brief"
            }))
            .await
            .unwrap();
        let job_id = added
            .strip_prefix("Scheduled recurring task ")
            .unwrap()
            .split(' ')
            .next()
            .unwrap()
            .to_string();

        let listed = tool
            .execute(serde_json::json!({"action": "list"}))
            .await
            .unwrap();
        assert!(listed.contains("morning brief"));
        assert!(listed.contains("recurring"));

        let removed = tool
            .execute(serde_json::json!({"action": "remove", "job_id": job_id}))
            .await
            .unwrap();
        assert!(removed.starts_with("Removed task "));

        let empty = tool
            .execute(serde_json::json!({"action": "list"}))
            .await
            .unwrap();
        assert_eq!(empty, "No scheduled tasks.");
    }

    #[tokio::test]
    async fn list_is_scoped_to_the_bound_chat() {
        let (tool, service) = bound_tool();
        service
            .add_once_job(
                "pandabot",
                "other-chat",
                Utc::now() + chrono::Duration::hours(1),
                "elsewhere",
            )
            .await
            .unwrap();

        let listed = tool
            .execute(serde_json::json!({"action": "list"}))
            .await
            .unwrap();
        assert_eq!(listed, "No scheduled tasks.");
    }

    #[tokio::test]
    async fn unbound_tool_refuses_to_schedule() {
        let (tool, _service) = tool();
        let err = tool
            .execute(serde_json::json!({
                "action": "add_once",
                "time": "2027-01-01T09:00:00Z",
                "prompt": "x"
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chat context"));
    }

    #[tokio::test]
    async fn bad_inputs_are_reported() {
        let (tool, _service) = bound_tool();
        assert!(tool
            .execute(serde_json::json!({"action": "add_once", "prompt": "x"}))
            .await
            .is_err());
        assert!(tool
            .execute(serde_json::json!({"action": "add_once", "time": "tomorrow", "prompt": "x"}))
            .await
            .is_err());
        assert!(tool
            .execute(serde_json::json!({"action": "explode"}))
            .await
            .is_err());
        assert!(tool.execute(serde_json::json!({})).await.is_err());
    }
}
