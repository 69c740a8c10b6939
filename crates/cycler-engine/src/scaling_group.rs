//! Scaling group adapter.
//!
//! A stopped group keeps its configuration but has every scaling process
//! suspended and its members stopped or terminated. A group is only "off"
//! once both hold; suspended processes alone mark "on its way off".

use std::str::FromStr;
use std::thread;

use cycler_core::ResourceKind;
use cycler_provider::{InstanceStatus, ScalingGroupInfo};
use tracing::{debug, warn};

use crate::context::RunContext;
use crate::cycle::{Cycle, unsupported};
use crate::error::{CycleError, CycleResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    /// Terminate members; the group replaces them when resumed.
    Terminate,
    /// Stop members and start the same instances again later.
    Stop,
}

impl FromStr for GroupAction {
    type Err = CycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" | "terminate" => Ok(GroupAction::Terminate),
            "stop" => Ok(GroupAction::Stop),
            other => Err(unsupported(ResourceKind::ScalingGroup, other)),
        }
    }
}

pub struct ScalingGroup<'c, 'a> {
    ctx: &'c RunContext<'a>,
    name: String,
}

impl<'c, 'a> ScalingGroup<'c, 'a> {
    pub fn new(ctx: &'c RunContext<'a>, name: &str) -> Self {
        Self {
            ctx,
            name: name.to_string(),
        }
    }

    fn describe(&self) -> CycleResult<ScalingGroupInfo> {
        self.ctx
            .clients
            .scaling
            .describe_group(&self.name)?
            .ok_or_else(|| CycleError::ResourceNotFound(format!("scaling group {}", self.name)))
    }

    /// Start one member if it is stopped. Returns whether it was started.
    fn start_member(&self, group: &ScalingGroupInfo, id: &str) -> CycleResult<bool> {
        let clients = self.ctx.clients;
        let Some(instance) = clients.compute.describe_instance(id)? else {
            debug!(group = %self.name, instance = %id, "member no longer exists");
            return Ok(false);
        };
        if instance.status != InstanceStatus::Stopped {
            debug!(group = %self.name, instance = %id, status = %instance.status, "member not stopped");
            return Ok(false);
        }

        self.ctx.mutate(
            format!("starting instance {id} in scaling group {}", self.name),
            || clients.compute.start_instance(id),
        )?;
        for lb in &group.load_balancers {
            self.ctx.mutate(
                format!("registering instance {id} with load balancer {lb}"),
                || clients.scaling.register_instance(lb, id),
            )?;
        }
        Ok(true)
    }

    /// Members that are neither stopped nor terminated (nor on their way).
    fn members_up<'g>(&self, group: &'g ScalingGroupInfo) -> CycleResult<Vec<&'g str>> {
        let mut up = Vec::new();
        for id in &group.instances {
            match self.ctx.clients.compute.describe_instance(id)? {
                Some(instance)
                    if matches!(instance.status, InstanceStatus::Pending | InstanceStatus::Running) =>
                {
                    up.push(id.as_str())
                }
                Some(_) => {}
                None => debug!(group = %self.name, instance = %id, "member no longer exists"),
            }
        }
        Ok(up)
    }

    /// Take one member out of every load balancer, then stop or terminate it.
    fn stop_member(
        &self,
        group: &ScalingGroupInfo,
        id: &str,
        action: GroupAction,
    ) -> CycleResult<()> {
        let clients = self.ctx.clients;
        for lb in &group.load_balancers {
            self.ctx.mutate(
                format!("deregistering instance {id} from load balancer {lb}"),
                || clients.scaling.deregister_instance(lb, id),
            )?;
        }
        match action {
            GroupAction::Stop => self.ctx.mutate(
                format!("stopping instance {id} in scaling group {}", self.name),
                || clients.compute.stop_instance(id),
            ),
            GroupAction::Terminate => self.ctx.mutate(
                format!("terminating instance {id} in scaling group {}", self.name),
                || clients.compute.terminate_instance(id),
            ),
        }
    }
}

impl Cycle for ScalingGroup<'_, '_> {
    type Action = GroupAction;

    fn start(&self, _action: GroupAction) -> CycleResult<()> {
        let group = self.describe()?;
        if group.suspended_processes.is_empty() {
            debug!(group = %self.name, "already running");
            return Ok(());
        }

        let mut started = 0;
        for id in &group.instances {
            if self.start_member(&group, id)? {
                started += 1;
            }
        }

        // Members need time to come up before the group resumes health
        // checks, or it replaces them.
        let grace = self.ctx.settings.grace_period;
        if started > 0 && !self.ctx.dryrun && !grace.is_zero() {
            debug!(group = %self.name, started, grace_secs = grace.as_secs(), "waiting for members");
            thread::sleep(grace);
        }

        let scaling = self.ctx.clients.scaling;
        self.ctx.mutate(
            format!("resuming processes for scaling group {}", self.name),
            || scaling.resume_processes(&self.name),
        )
    }

    fn stop(&self, action: GroupAction) -> CycleResult<()> {
        let group = self.describe()?;
        let suspended = !group.suspended_processes.is_empty();
        let up = self.members_up(&group)?;
        if suspended && up.is_empty() {
            debug!(group = %self.name, "already suspended");
            return Ok(());
        }

        if !suspended {
            let scaling = self.ctx.clients.scaling;
            self.ctx.mutate(
                format!("suspending processes for scaling group {}", self.name),
                || scaling.suspend_processes(&self.name),
            )?;
        }

        // Keep going past a failing member; the next pass picks up whatever is still up.
        let mut first_error = None;
        for id in up {
            if let Err(error) = self.stop_member(&group, id, action) {
                warn!(group = %self.name, instance = %id, %error, "member not stopped");
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
