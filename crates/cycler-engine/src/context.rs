//! Per-run context: collaborators, the run clock and memoised inventories.
//!
//! A `RunContext` lives for one task pass. Inventories and the dependency
//! graph are loaded on first use and read-only afterwards; the next pass
//! builds a fresh context.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::info;

use cycler_core::{CyclerConfig, ResourceKind, TaskConfig};
use cycler_provider::Clients;
use cycler_state::{ObjectStore, OverrideStore, SnapshotStore};

use crate::error::{CycleError, CycleResult};
use crate::graph::DependencyGraph;

/// Task-level knobs the adapters read.
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub name: String,
    /// Template parameter that receives the database snapshot id on rebuild.
    pub rds_snapshot_parameter: Option<String>,
    /// Pause after restarting scaling group members.
    pub grace_period: Duration,
}

impl TaskSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rds_snapshot_parameter: None,
            grace_period: Duration::from_secs(cycler_core::config::DEFAULT_GRACE_PERIOD_SECS),
        }
    }

    pub fn from_config(task: &TaskConfig) -> Self {
        Self {
            name: task.name.clone(),
            rds_snapshot_parameter: task.rds_snapshot_parameter.clone(),
            grace_period: task.grace_period(),
        }
    }
}

pub struct RunContext<'a> {
    pub clients: Clients<'a>,
    pub objects: &'a dyn ObjectStore,
    pub overrides: &'a dyn OverrideStore,
    /// The run clock. Every schedule in the pass is evaluated against it.
    pub now: DateTime<Local>,
    pub dryrun: bool,
    pub bucket_prefix: String,
    pub settings: TaskSettings,
    instances: OnceCell<BTreeMap<String, String>>,
    groups: OnceCell<Vec<String>>,
    stacks: OnceCell<Vec<String>>,
    graph: OnceCell<DependencyGraph>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        clients: Clients<'a>,
        objects: &'a dyn ObjectStore,
        overrides: &'a dyn OverrideStore,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            clients,
            objects,
            overrides,
            now,
            dryrun: false,
            bucket_prefix: String::new(),
            settings: TaskSettings::new("adhoc"),
            instances: OnceCell::new(),
            groups: OnceCell::new(),
            stacks: OnceCell::new(),
            graph: OnceCell::new(),
        }
    }

    /// Context for one configured task, with defaults applied.
    pub fn for_task(
        clients: Clients<'a>,
        objects: &'a dyn ObjectStore,
        overrides: &'a dyn OverrideStore,
        now: DateTime<Local>,
        config: &CyclerConfig,
        task: &TaskConfig,
    ) -> Self {
        Self::new(clients, objects, overrides, now)
            .with_dryrun(config.dryrun_for(task))
            .with_bucket_prefix(config.bucket_prefix_for(task))
            .with_settings(TaskSettings::from_config(task))
    }

    pub fn with_dryrun(mut self, dryrun: bool) -> Self {
        self.dryrun = dryrun;
        self
    }

    pub fn with_bucket_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bucket_prefix = prefix.into();
        self
    }

    pub fn with_settings(mut self, settings: TaskSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Saved-stack persistence under this run's prefix.
    pub fn snapshots(&self) -> SnapshotStore<'a> {
        SnapshotStore::new(self.objects, &self.bucket_prefix)
    }

    /// Run a mutating call, or only log it in dry-run mode.
    pub fn mutate<E, F>(&self, message: impl fmt::Display, call: F) -> CycleResult<()>
    where
        E: Into<CycleError>,
        F: FnOnce() -> Result<(), E>,
    {
        if self.dryrun {
            info!("noop - {message}");
            return Ok(());
        }
        info!("{message}");
        call().map_err(Into::into)
    }

    // ── Inventories ────────────────────────────────────────────────

    /// Instance name → provider instance id.
    pub fn instance_inventory(&self) -> CycleResult<&BTreeMap<String, String>> {
        memoise(&self.instances, || {
            Ok(self
                .clients
                .compute
                .list_instances()?
                .into_iter()
                .map(|i| (i.name, i.id))
                .collect())
        })
    }

    pub fn group_inventory(&self) -> CycleResult<&[String]> {
        memoise(&self.groups, || {
            Ok(self
                .clients
                .scaling
                .list_groups()?
                .into_iter()
                .map(|g| g.name)
                .collect())
        })
        .map(Vec::as_slice)
    }

    /// Live stacks plus stacks that only exist as saved state, so a
    /// torn-down stack can still be selected and rebuilt.
    pub fn stack_inventory(&self) -> CycleResult<&[String]> {
        memoise(&self.stacks, || {
            let mut names: Vec<String> = self
                .clients
                .stacks
                .list_stacks()?
                .into_iter()
                .map(|s| s.name)
                .collect();
            names.extend(self.snapshots().saved_stacks()?);
            names.sort();
            names.dedup();
            Ok(names)
        })
        .map(Vec::as_slice)
    }

    /// Selectable ids for a kind. Instances are selected by name.
    pub fn inventory(&self, kind: ResourceKind) -> CycleResult<Vec<&str>> {
        Ok(match kind {
            ResourceKind::Instance => self
                .instance_inventory()?
                .keys()
                .map(String::as_str)
                .collect(),
            ResourceKind::ScalingGroup => {
                self.group_inventory()?.iter().map(String::as_str).collect()
            }
            ResourceKind::Stack => self.stack_inventory()?.iter().map(String::as_str).collect(),
        })
    }

    pub fn graph(&self) -> CycleResult<&DependencyGraph> {
        memoise(&self.graph, || {
            Ok(DependencyGraph::build(self.clients.stacks)?)
        })
    }
}

fn memoise<T, F>(cell: &OnceCell<T>, load: F) -> CycleResult<&T>
where
    F: FnOnce() -> CycleResult<T>,
{
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = load()?;
    Ok(cell.get_or_init(|| value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cycler_provider::{InstanceStatus, ProviderCall, SimulatedCloud};
    use cycler_state::{StackSnapshot, StateStore};

    fn at_noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn dryrun_skips_the_call() {
        let cloud = SimulatedCloud::new().with_instance("i-1", "a", InstanceStatus::Stopped);
        let store = StateStore::open_in_memory().unwrap();
        let ctx = RunContext::new(Clients::from_cloud(&cloud), &store, &store, at_noon())
            .with_dryrun(true);

        ctx.mutate("starting a", || {
            cycler_provider::ComputeApi::start_instance(&cloud, "i-1")
        })
        .unwrap();
        assert!(cloud.calls().is_empty());

        let live = ctx.with_dryrun(false);
        live.mutate("starting a", || {
            cycler_provider::ComputeApi::start_instance(&cloud, "i-1")
        })
        .unwrap();
        assert_eq!(cloud.calls(), vec![ProviderCall::StartInstance("i-1".into())]);
    }

    #[test]
    fn stack_inventory_includes_saved_stacks() {
        let cloud = SimulatedCloud::new().with_stack("live", Default::default());
        let store = StateStore::open_in_memory().unwrap();
        SnapshotStore::new(&store, "cycler")
            .save("gone", &StackSnapshot::default())
            .unwrap();
        SnapshotStore::new(&store, "cycler")
            .save("live", &StackSnapshot::default())
            .unwrap();

        let ctx = RunContext::new(Clients::from_cloud(&cloud), &store, &store, at_noon())
            .with_bucket_prefix("cycler");
        assert_eq!(ctx.stack_inventory().unwrap(), ["gone", "live"]);
    }

    #[test]
    fn inventories_are_loaded_once() {
        let cloud = SimulatedCloud::new().with_instance("i-1", "web", InstanceStatus::Running);
        let store = StateStore::open_in_memory().unwrap();
        let ctx = RunContext::new(Clients::from_cloud(&cloud), &store, &store, at_noon());

        assert_eq!(ctx.instance_inventory().unwrap()["web"], "i-1");
        // Later changes are invisible for the rest of the pass.
        cycler_provider::ComputeApi::terminate_instance(&cloud, "i-1").unwrap();
        assert_eq!(ctx.inventory(ResourceKind::Instance).unwrap(), vec!["web"]);
    }
}
