// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory scheduler: cron and one-shot jobs firing scheduled tasks.
//!
//! Jobs do not survive a restart. Each due job re-enters the orchestration
//! loop through [`TaskRunner::run_task`], which already converts failures
//! into delivered error text, so a bad job never stops the tick loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use croner::Cron;
use pandabot_core::PandabotError;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::runner::TaskRunner;

const DEFAULT_TICK: Duration = Duration::from_millis(500);

enum Schedule {
    /// Recurring 5-field cron expression.
    Cron(Cron),
    /// Fires once, then the job is removed.
    Once,
}

struct Job {
    bot_id: String,
    chat_id: String,
    prompt: String,
    schedule: Schedule,
    next_run: DateTime<Utc>,
}

/// Read-only view of a scheduled job.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub id: String,
    pub bot_id: String,
    pub chat_id: String,
    pub prompt: String,
    pub next_run: DateTime<Utc>,
    pub recurring: bool,
}

/// Fires due jobs from an in-memory table.
pub struct SchedulerService {
    runner: Arc<TaskRunner>,
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    tick: Duration,
}

fn mint_job_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

impl SchedulerService {
    pub fn new(runner: Arc<TaskRunner>) -> Self {
        Self {
            runner,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            tick: DEFAULT_TICK,
        }
    }

    /// Overrides the poll interval of the tick loop.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Adds a recurring job from a 5-field cron expression. Returns the
    /// job id.
    pub async fn add_cron_job(
        &self,
        bot_id: &str,
        chat_id: &str,
        expression: &str,
        prompt: &str,
    ) -> Result<String, PandabotError> {
        let cron = Cron::new(expression).parse().map_err(|e| {
            PandabotError::Tool(format!("invalid cron expression '{expression}': {e}"))
        })?;
        let next_run = cron
            .find_next_occurrence(&Utc::now(), false)
            .map_err(|e| {
                PandabotError::Tool(format!("cron expression '{expression}' never fires: {e}"))
            })?;

        let id = mint_job_id();
        info!(job_id = %id, bot_id, chat_id, expression, "cron job added");
        self.jobs.lock().await.insert(
            id.clone(),
            Job {
                bot_id: bot_id.to_string(),
                chat_id: chat_id.to_string(),
                prompt: prompt.to_string(),
                schedule: Schedule::Cron(cron),
                next_run,
            },
        );
        Ok(id)
    }

    /// Adds a one-shot job at a fixed instant. Returns the job id.
    pub async fn add_once_job(
        &self,
        bot_id: &str,
        chat_id: &str,
        at: DateTime<Utc>,
        prompt: &str,
    ) -> Result<String, PandabotError> {
        if at <= Utc::now() {
            return Err(PandabotError::Tool(format!(
                "scheduled time {at} is in the past"
            )));
        }

        let id = mint_job_id();
        info!(job_id = %id, bot_id, chat_id, at = %at, "one-shot job added");
        self.jobs.lock().await.insert(
            id.clone(),
            Job {
                bot_id: bot_id.to_string(),
                chat_id: chat_id.to_string(),
                prompt: prompt.to_string(),
                schedule: Schedule::Once,
                next_run: at,
            },
        );
        Ok(id)
    }

    /// All jobs, soonest first.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        let jobs = self.jobs.lock().await;
        let mut infos: Vec<JobInfo> = jobs
            .iter()
            .map(|(id, job)| JobInfo {
                id: id.clone(),
                bot_id: job.bot_id.clone(),
                chat_id: job.chat_id.clone(),
                prompt: job.prompt.clone(),
                next_run: job.next_run,
                recurring: matches!(job.schedule, Schedule::Cron(_)),
            })
            .collect();
        infos.sort_by_key(|info| info.next_run);
        infos
    }

    /// Removes a job. Returns false when the id is unknown.
    pub async fn remove_job(&self, id: &str) -> bool {
        let removed = self.jobs.lock().await.remove(id).is_some();
        if removed {
            info!(job_id = %id, "job removed");
        }
        removed
    }

    /// Tick loop: fires due jobs until the token is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(tick_ms = self.tick.as_millis() as u64, "scheduler started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("scheduler stopped");
                    return;
                }
                _ = tokio::time::sleep(self.tick) => {}
            }
            self.fire_due_jobs().await;
        }
    }

    async fn fire_due_jobs(&self) {
        let now = Utc::now();
        let mut due: Vec<(String, String, String, String)> = Vec::new();

        {
            let mut jobs = self.jobs.lock().await;
            let mut finished: Vec<String> = Vec::new();
            for (id, job) in jobs.iter_mut() {
                if job.next_run > now {
                    continue;
                }
                due.push((
                    id.clone(),
                    job.bot_id.clone(),
                    job.chat_id.clone(),
                    job.prompt.clone(),
                ));
                match &job.schedule {
                    Schedule::Once => finished.push(id.clone()),
                    Schedule::Cron(cron) => match cron.find_next_occurrence(&now, false) {
                        Ok(next) => job.next_run = next,
                        Err(e) => {
                            warn!(job_id = %id, error = %e, "cron job has no next occurrence");
                            finished.push(id.clone());
                        }
                    },
                }
            }
            for id in finished {
                jobs.remove(&id);
            }
        }

        for (id, bot_id, chat_id, prompt) in due {
            info!(job_id = %id, bot_id = %bot_id, chat_id = %chat_id, "job fired");
            let runner = self.runner.clone();
            tokio::spawn(async move {
                runner.run_task(&bot_id, &chat_id, &prompt).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pandabot_agent::orchestrator::Orchestrator;
    use pandabot_config::AgentConfig;
    use pandabot_core::ChatResponse;
    use pandabot_test_utils::{MemoryStore, MockBackend, MockMessenger};
    use pandabot_tools::ToolRegistry;

    fn service(messenger: Arc<MockMessenger>, responses: Vec<ChatResponse>) -> SchedulerService {
        let registry = Arc::new(ToolRegistry::new());
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(MockBackend::with_responses(responses)),
            registry.clone(),
            store.clone(),
        ));
        let runner = Arc::new(TaskRunner::new(
            orchestrator,
            registry,
            store,
            messenger,
            AgentConfig::default(),
        ));
        SchedulerService::new(runner).with_tick(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn invalid_cron_expression_is_rejected() {
        let service = service(Arc::new(MockMessenger::new()), vec![]);
        let err = service
            .add_cron_job("pandabot", "c1", "not a cron", "never")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a cron"));
    }

    #[tokio::test]
    async fn past_once_jobs_are_rejected() {
        let service = service(Arc::new(MockMessenger::new()), vec![]);
        let yesterday = Utc::now() - chrono::Duration::days(1);
        assert!(service
            .add_once_job("pandabot", "c1", yesterday, "too late")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn add_list_remove_round_trip() {
        let service = service(Arc::new(MockMessenger::new()), vec![]);
        let cron_id = service
            .add_cron_job("pandabot", "c1", "0 9 * * *", "morning brief")
            .await
            .unwrap();
        let once_id = service
            .add_once_job(
                "pandabot",
                "c1",
                Utc::now() + chrono::Duration::hours(1),
                "one reminder",
            )
            .await
            .unwrap();

        let jobs = service.list_jobs().await;
        assert_eq!(jobs.len(), 2);
        let cron_job = jobs.iter().find(|j| j.id == cron_id).unwrap();
        assert!(cron_job.recurring);
        let once_job = jobs.iter().find(|j| j.id == once_id).unwrap();
        assert!(!once_job.recurring);

        assert!(service.remove_job(&once_id).await);
        assert!(!service.remove_job(&once_id).await);
        assert_eq!(service.list_jobs().await.len(), 1);
    }

    #[tokio::test]
    async fn once_job_fires_and_is_removed() {
        let messenger = Arc::new(MockMessenger::new());
        let service = Arc::new(service(
            messenger.clone(),
            vec![ChatResponse::text("reminder delivered")],
        ));
        service
            .add_once_job(
                "pandabot",
                "c1",
                Utc::now() + chrono::Duration::milliseconds(100),
                "remind me",
            )
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let loop_service = service.clone();
        let loop_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move { loop_service.run(loop_shutdown).await });

        let mut delivered = Vec::new();
        for _ in 0..100 {
            delivered = messenger.sent().await;
            if !delivered.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].text, "reminder delivered");
        assert!(service.list_jobs().await.is_empty());
    }
}
