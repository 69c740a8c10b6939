//! Single compute instance adapter.

use std::str::FromStr;

use cycler_core::ResourceKind;
use cycler_provider::{InstanceInfo, InstanceStatus};
use tracing::debug;

use crate::context::RunContext;
use crate::cycle::{Cycle, unsupported};
use crate::error::{CycleError, CycleResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceAction {
    Default,
}

impl FromStr for InstanceAction {
    type Err = CycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(InstanceAction::Default),
            other => Err(unsupported(ResourceKind::Instance, other)),
        }
    }
}

pub struct Instance<'c, 'a> {
    ctx: &'c RunContext<'a>,
    name: String,
    id: String,
}

impl<'c, 'a> Instance<'c, 'a> {
    pub fn new(ctx: &'c RunContext<'a>, name: &str, id: &str) -> Self {
        Self {
            ctx,
            name: name.to_string(),
            id: id.to_string(),
        }
    }

    /// Resolve a selected name through the run's instance inventory.
    pub fn by_name(ctx: &'c RunContext<'a>, name: &str) -> CycleResult<Self> {
        let id = ctx
            .instance_inventory()?
            .get(name)
            .ok_or_else(|| CycleError::ResourceNotFound(format!("instance {name}")))?;
        Ok(Self::new(ctx, name, id))
    }

    fn describe(&self) -> CycleResult<InstanceInfo> {
        self.ctx
            .clients
            .compute
            .describe_instance(&self.id)?
            .ok_or_else(|| CycleError::ResourceNotFound(format!("instance {}", self.id)))
    }
}

impl Cycle for Instance<'_, '_> {
    type Action = InstanceAction;

    fn start(&self, _action: InstanceAction) -> CycleResult<()> {
        let info = self.describe()?;
        if info.status != InstanceStatus::Stopped {
            debug!(instance = %self.name, id = %self.id, status = %info.status, "not stopped, leaving alone");
            return Ok(());
        }
        let compute = self.ctx.clients.compute;
        self.ctx.mutate(
            format!("starting instance {} ({})", self.name, self.id),
            || compute.start_instance(&self.id),
        )
    }

    fn stop(&self, _action: InstanceAction) -> CycleResult<()> {
        let info = self.describe()?;
        if info.status != InstanceStatus::Running {
            debug!(instance = %self.name, id = %self.id, status = %info.status, "not running, leaving alone");
            return Ok(());
        }
        let compute = self.ctx.clients.compute;
        self.ctx.mutate(
            format!("stopping instance {} ({})", self.name, self.id),
            || compute.stop_instance(&self.id),
        )
    }
}
