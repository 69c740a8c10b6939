//! Composite stack controller.
//!
//! A stack is switched off in one of two ways:
//!
//! - **teardown**: snapshot every database, persist template, parameters,
//!   resource inventory and outputs to the object store, then delete the
//!   stack. Starting it rebuilds from the saved state, restoring the
//!   database from its latest snapshot through a template parameter.
//! - **scale down**: record each nested scaling group's bounds, then set
//!   every group to 0/0/0. Starting it restores the recorded bounds.
//!
//! Teardown is only used when the stack passes [`Stack::rebuild_safe`];
//! otherwise a stop falls back to scaling down.

use std::collections::BTreeMap;
use std::str::FromStr;

use cycler_core::{ResourceKind, resource_types};
use cycler_provider::{CreateStack, DbSnapshot, StackInfo};
use cycler_state::{ResourceInventory, ScalingBounds, StackSnapshot};
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::cycle::{Cycle, unsupported};
use crate::error::{CycleError, CycleResult};

/// Tag applied to every stack the cycler creates.
pub const CREATED_BY_TAG: &str = "created-by";
pub const CREATED_BY: &str = "cloud-cycler";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackAction {
    /// Tear down when safe, scale down otherwise; rebuild or scale up.
    Default,
    /// Never delete: scale down and scale up only.
    ScaleDown,
}

impl FromStr for StackAction {
    type Err = CycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(StackAction::Default),
            "scale_down" => Ok(StackAction::ScaleDown),
            other => Err(unsupported(ResourceKind::Stack, other)),
        }
    }
}

/// Observed state of a stack at the start of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackState {
    Missing,
    Present(StackInfo),
    /// Status ends in `_FAILED`; never remediated automatically.
    Failed(String),
}

pub struct Stack<'c, 'a> {
    ctx: &'c RunContext<'a>,
    name: String,
}

impl<'c, 'a> Stack<'c, 'a> {
    pub fn new(ctx: &'c RunContext<'a>, name: &str) -> Self {
        Self {
            ctx,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CycleResult<StackState> {
        Ok(match self.ctx.clients.stacks.describe_stack(&self.name)? {
            None => StackState::Missing,
            Some(info) if info.is_failed() => StackState::Failed(info.status),
            Some(info) => StackState::Present(info),
        })
    }

    /// Recursive resource inventory of a live stack.
    ///
    /// Nested stacks expand to their own inventory, scaling groups are
    /// captured with their current bounds.
    pub fn resources_of(&self, stack: &str) -> CycleResult<ResourceInventory> {
        let clients = self.ctx.clients;
        let mut inventory = ResourceInventory::default();
        for resource in clients.stacks.list_resources(stack)? {
            match resource.resource_type.as_str() {
                resource_types::STACK => {
                    let nested = self.resources_of(&resource.physical_id)?;
                    inventory.add_stack(&resource.physical_id, nested);
                }
                resource_types::SCALING_GROUP => {
                    match clients.scaling.describe_group(&resource.physical_id)? {
                        Some(group) => inventory.add_scaling_group(&group.name, group.bounds),
                        None => warn!(
                            stack = %stack,
                            group = %resource.physical_id,
                            "stack lists a scaling group that does not exist, leaving it out"
                        ),
                    }
                }
                other => inventory.add_resource(other, &resource.physical_id),
            }
        }
        Ok(inventory)
    }

    /// Whether this stack can be deleted and later rebuilt from saved state.
    pub fn rebuild_safe(&self) -> CycleResult<bool> {
        let name = &self.name;
        let inventory = self.resources_of(name)?;

        let databases = inventory.database_instances();
        if databases.len() > 1 {
            warn!(stack = %name, databases = databases.len(), "more than one database, not safe to rebuild");
            return Ok(false);
        }
        if databases.len() == 1 {
            let Some(parameter) = &self.ctx.settings.rds_snapshot_parameter else {
                warn!(stack = %name, "database present but no snapshot parameter configured");
                return Ok(false);
            };
            let template = self.ctx.clients.stacks.get_template(name)?;
            if !declares_parameter(&template, parameter) {
                warn!(stack = %name, %parameter, "template does not declare the snapshot parameter");
                return Ok(false);
            }
        }

        let statics = inventory.compute_instances();
        if !statics.is_empty() {
            warn!(stack = %name, instances = statics.len(), "stack owns static instances, not safe to rebuild");
            return Ok(false);
        }

        if let Some(node) = self.ctx.graph()?.node(name).filter(|node| node.is_linked()) {
            warn!(
                stack = %name,
                child_of = ?node.child_of,
                needs = ?node.needs,
                feeds = ?node.feeds,
                "linked to other stacks, not safe to rebuild"
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Recreate a missing stack from its saved state.
    pub fn rebuild(&self) -> CycleResult<()> {
        match self.state()? {
            StackState::Missing => {}
            StackState::Present(_) => {
                debug!(stack = %self.name, "already present");
                return Ok(());
            }
            StackState::Failed(status) => {
                warn!(stack = %self.name, %status, "stack failed, not rebuilding");
                return Ok(());
            }
        }

        let Some(saved) = self.ctx.snapshots().load(&self.name)? else {
            let err = CycleError::StorageMissing(self.name.clone());
            warn!(stack = %self.name, error = %err, "cannot rebuild");
            return Ok(());
        };

        let databases = saved.resources.database_instances();
        if databases.len() > 1 {
            return Err(CycleError::UnsafeRebuild {
                stack: self.name.clone(),
                reason: format!("{} databases recorded", databases.len()),
            });
        }

        let mut parameters = saved.parameters;
        if let (Some(db), Some(parameter)) =
            (databases.first(), &self.ctx.settings.rds_snapshot_parameter)
        {
            let snapshots = self.ctx.clients.databases.list_snapshots(db)?;
            match latest_snapshot(snapshots) {
                Some(snapshot) => {
                    info!(stack = %self.name, db = %db, snapshot = %snapshot.id, "restoring database from snapshot");
                    parameters.insert(parameter.clone(), snapshot.id);
                }
                None => warn!(stack = %self.name, db = %db, "no database snapshot found"),
            }
        }

        let request = CreateStack {
            name: self.name.clone(),
            template: saved.template,
            parameters,
            tags: BTreeMap::from([(CREATED_BY_TAG.to_string(), CREATED_BY.to_string())]),
        };
        let stacks = self.ctx.clients.stacks;
        self.ctx.mutate(format!("rebuilding stack {}", self.name), || {
            stacks.create_stack(&request)
        })
    }

    /// Snapshot databases, persist the stack, then delete it.
    pub fn delete(&self) -> CycleResult<()> {
        match self.state()? {
            StackState::Present(info) => self.delete_present(&info),
            StackState::Missing => {
                debug!(stack = %self.name, "already deleted");
                Ok(())
            }
            StackState::Failed(status) => {
                warn!(stack = %self.name, %status, "stack failed, not deleting");
                Ok(())
            }
        }
    }

    fn delete_present(&self, info: &StackInfo) -> CycleResult<()> {
        let clients = self.ctx.clients;
        let inventory = self.resources_of(&self.name)?;

        let stamp = self.ctx.now.format("%Y%m%d%H%M%S").to_string();
        for db in inventory.database_instances() {
            let snapshot_id = format!("{db}-cc-{stamp}");
            self.ctx.mutate(
                format!("creating snapshot {snapshot_id} of database {db}"),
                || clients.databases.create_snapshot(&db, &snapshot_id),
            )?;
        }

        let snapshot = StackSnapshot {
            template: clients.stacks.get_template(&self.name)?,
            parameters: info.parameters.clone(),
            resources: inventory,
            outputs: info.outputs.clone(),
        };
        let saved = self.ctx.snapshots();
        self.ctx.mutate(format!("saving stack {}", self.name), || {
            saved.save(&self.name, &snapshot)
        })?;

        self.ctx.mutate(format!("deleting stack {}", self.name), || {
            clients.stacks.delete_stack(&self.name)
        })
    }

    /// Record and zero every nested scaling group.
    pub fn scale_down(&self) -> CycleResult<()> {
        let groups = self.resources_of(&self.name)?.all_scaling_groups();
        let saved = self.ctx.snapshots();
        let scaling = self.ctx.clients.scaling;

        let mut changed = 0;
        for (group, bounds) in groups {
            if bounds.is_zero() {
                debug!(stack = %self.name, %group, "already scaled down");
                continue;
            }
            self.ctx.mutate(
                format!("saving bounds {bounds} of scaling group {group}"),
                || saved.save_group_bounds(&self.name, &group, &bounds),
            )?;
            self.ctx.mutate(
                format!("scaling down scaling group {group} in stack {}", self.name),
                || scaling.update_bounds(&group, ScalingBounds::ZERO),
            )?;
            changed += 1;
        }
        if changed == 0 {
            debug!(stack = %self.name, "nothing to scale down");
        }
        Ok(())
    }

    /// Restore recorded bounds on every zeroed nested scaling group.
    pub fn scale_up(&self) -> CycleResult<()> {
        let groups = self.resources_of(&self.name)?.all_scaling_groups();
        let saved = self.ctx.snapshots();
        let scaling = self.ctx.clients.scaling;

        let mut zeroed = 0;
        for (group, bounds) in groups {
            if !bounds.is_zero() {
                continue;
            }
            zeroed += 1;
            let Some(restore) = saved.load_group_bounds(&self.name, &group)? else {
                warn!(stack = %self.name, %group, "no saved bounds, leaving at zero");
                continue;
            };
            self.ctx.mutate(
                format!("scaling up scaling group {group} in stack {} to {restore}", self.name),
                || scaling.update_bounds(&group, restore),
            )?;
        }
        if zeroed == 0 {
            debug!(stack = %self.name, "no scaled down groups");
        }
        Ok(())
    }
}

impl Cycle for Stack<'_, '_> {
    type Action = StackAction;

    fn start(&self, action: StackAction) -> CycleResult<()> {
        match (self.state()?, action) {
            (StackState::Failed(status), _) => {
                warn!(stack = %self.name, %status, "stack failed, not starting");
                Ok(())
            }
            (StackState::Present(_), _) => self.scale_up(),
            (StackState::Missing, StackAction::Default) => self.rebuild(),
            (StackState::Missing, StackAction::ScaleDown) => {
                debug!(stack = %self.name, "stack missing, nothing to scale up");
                Ok(())
            }
        }
    }

    fn stop(&self, action: StackAction) -> CycleResult<()> {
        match (self.state()?, action) {
            (StackState::Missing, _) => {
                debug!(stack = %self.name, "already stopped");
                Ok(())
            }
            (StackState::Failed(status), _) => {
                warn!(stack = %self.name, %status, "stack failed, skipping");
                Ok(())
            }
            (StackState::Present(info), StackAction::Default) => {
                if self.rebuild_safe()? {
                    self.delete_present(&info)
                } else {
                    info!(stack = %self.name, "not safe to rebuild, scaling down");
                    self.scale_down()
                }
            }
            (StackState::Present(_), StackAction::ScaleDown) => self.scale_down(),
        }
    }
}

/// Whether a JSON template declares `parameter` under `Parameters`.
fn declares_parameter(template: &str, parameter: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(template)
        .ok()
        .and_then(|body| body.get("Parameters")?.get(parameter).cloned())
        .is_some()
}

/// Most recently created snapshot; on equal times the later entry wins.
fn latest_snapshot(snapshots: Vec<DbSnapshot>) -> Option<DbSnapshot> {
    snapshots.into_iter().fold(None, |best, candidate| match best {
        Some(best) if best.created_at > candidate.created_at => Some(best),
        _ => Some(candidate),
    })
}
