//! Run driver: one pass over every configured task.

use chrono::{DateTime, Local};
use tracing::{error, info, info_span};

use cycler_core::{CyclerConfig, TaskConfig};
use cycler_provider::Clients;
use cycler_state::{ObjectStore, OverrideStore};

use crate::context::RunContext;
use crate::error::CycleError;
use crate::task::{RunReport, Task};

/// Collaborators shared by every task in a pass.
#[derive(Clone, Copy)]
pub struct Environment<'a> {
    pub clients: Clients<'a>,
    pub objects: &'a dyn ObjectStore,
    pub overrides: &'a dyn OverrideStore,
    /// Force dry-run regardless of configuration.
    pub force_dryrun: bool,
}

/// Result of one task in a pass.
#[derive(Debug)]
pub enum TaskRun {
    Completed(RunReport),
    /// The task could not be set up (bad schedule, bad matcher, failed
    /// inventory read); none of its resources were touched.
    Aborted { task: String, error: CycleError },
}

impl TaskRun {
    pub fn task(&self) -> &str {
        match self {
            TaskRun::Completed(report) => &report.task,
            TaskRun::Aborted { task, .. } => task,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskRun::Completed(report) if report.is_success())
    }
}

impl<'a> Environment<'a> {
    pub fn new(
        clients: Clients<'a>,
        objects: &'a dyn ObjectStore,
        overrides: &'a dyn OverrideStore,
    ) -> Self {
        Self {
            clients,
            objects,
            overrides,
            force_dryrun: false,
        }
    }

    pub fn with_force_dryrun(mut self, force: bool) -> Self {
        self.force_dryrun = force;
        self
    }

    /// Run every task (or only `only`) against the clock `now`.
    pub fn run_all(
        &self,
        config: &CyclerConfig,
        only: Option<&str>,
        now: DateTime<Local>,
    ) -> Vec<TaskRun> {
        config
            .tasks
            .iter()
            .filter(|task| only.is_none_or(|name| task.name == name))
            .map(|task| self.run_task(config, task, now))
            .collect()
    }

    pub fn run_task(
        &self,
        config: &CyclerConfig,
        task: &TaskConfig,
        now: DateTime<Local>,
    ) -> TaskRun {
        let span = info_span!("task", name = %task.name);
        let _guard = span.enter();

        let ctx = RunContext::for_task(
            self.clients,
            self.objects,
            self.overrides,
            now,
            config,
            task,
        );
        let ctx = if self.force_dryrun {
            ctx.with_dryrun(true)
        } else {
            ctx
        };
        info!(dryrun = ctx.dryrun, prefix = %ctx.bucket_prefix, %now, "starting task");

        match Task::from_config(task, &ctx) {
            Ok(selected) => TaskRun::Completed(selected.run(&ctx)),
            Err(error) => {
                error!(%error, "task aborted");
                TaskRun::Aborted {
                    task: task.name.clone(),
                    error,
                }
            }
        }
    }
}
