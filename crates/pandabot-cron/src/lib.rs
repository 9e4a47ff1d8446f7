// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling for pandabot: an in-memory job table firing cron and
//! one-shot tasks back into the orchestration loop, plus the tool
//! capability that lets the model manage those jobs.

pub mod runner;
pub mod service;
pub mod tool;

pub use runner::TaskRunner;
pub use service::{JobInfo, SchedulerService};
pub use tool::SchedulerTool;
