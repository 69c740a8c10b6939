use anyhow::{Context, bail};
use chrono::{DateTime, Local};
use cycler_engine::{Environment, TaskRun};
use cycler_provider::{Clients, SimulatedCloud};
use tracing::info;

use super::{load_config, open_state, parse_clock};
use crate::PassArgs;

pub fn run(args: &PassArgs, at: Option<&str>) -> anyhow::Result<()> {
    let now = parse_clock(at)?;
    let runs = pass(args, now)?;
    print_summary(&runs);

    let failed = runs.iter().filter(|run| !run.is_success()).count();
    if failed > 0 {
        bail!("{failed} task(s) finished with failures");
    }
    Ok(())
}

/// Load everything, run one pass at `now` and write the fleet back.
pub fn pass(args: &PassArgs, now: DateTime<Local>) -> anyhow::Result<Vec<TaskRun>> {
    let config = load_config(&args.store.config)?;
    if let Some(name) = &args.task {
        if config.task(name).is_none() {
            bail!("no task named {name:?} in {}", args.store.config.display());
        }
    }
    let store = open_state(&args.store, &config)?;
    let cloud = SimulatedCloud::load(&args.fleet)
        .with_context(|| format!("loading fleet {}", args.fleet.display()))?;

    let runs = Environment::new(Clients::from_cloud(&cloud), &store, &store)
        .with_force_dryrun(args.dry_run)
        .run_all(&config, args.task.as_deref(), now);

    if !args.dry_run {
        cloud.save(&args.fleet)?;
        info!(fleet = %args.fleet.display(), "fleet updated");
    }
    Ok(runs)
}

pub fn print_summary(runs: &[TaskRun]) {
    for run in runs {
        match run {
            TaskRun::Completed(report) => {
                println!("task {}", report.task);
                if report.entries.is_empty() {
                    println!("  (nothing selected)");
                }
                for (resource, outcome) in &report.entries {
                    println!("  {:<40} {}", resource.to_string(), outcome);
                }
            }
            TaskRun::Aborted { task, error } => {
                println!("task {task}");
                println!("  aborted: {error}");
            }
        }
    }
}
