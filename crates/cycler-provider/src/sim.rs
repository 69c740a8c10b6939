//! SimulatedCloud: an in-memory provider.
//!
//! Holds a [`Fleet`] (instances, scaling groups, stacks, load balancers and
//! database snapshots) behind a mutex and applies each mutation the way the
//! real service would. Every mutating call is appended to a call log so
//! tests can assert exactly which requests were issued.
//!
//! A fleet serializes to JSON, so the CLI can load one from disk, run a
//! pass against it and write the result back.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ComputeApi, DatabaseApi, ScalingApi, StackApi};
use crate::error::{ProviderError, ProviderResult};
use crate::types::*;

/// Processes a scaling group runs when nothing is suspended.
pub const SCALING_PROCESSES: [&str; 8] = [
    "Launch",
    "Terminate",
    "HealthCheck",
    "ReplaceUnhealthy",
    "AZRebalance",
    "AlarmNotification",
    "ScheduledActions",
    "AddToLoadBalancer",
];

/// Status given to stacks created through the simulator.
pub const CREATE_COMPLETE: &str = "CREATE_COMPLETE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    #[serde(default)]
    pub instances: BTreeMap<String, SimInstance>,
    #[serde(default)]
    pub groups: BTreeMap<String, SimGroup>,
    #[serde(default)]
    pub stacks: BTreeMap<String, SimStack>,
    /// Registered instance ids per load balancer.
    #[serde(default)]
    pub load_balancers: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub snapshots: Vec<DbSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimInstance {
    pub name: String,
    pub status: InstanceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimGroup {
    pub bounds: ScalingBounds,
    #[serde(default)]
    pub suspended_processes: Vec<String>,
    #[serde(default)]
    pub instances: Vec<String>,
    #[serde(default)]
    pub load_balancers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimStack {
    pub status: String,
    pub template: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: Vec<StackResource>,
}

/// A mutating request recorded by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    StartInstance(String),
    StopInstance(String),
    TerminateInstance(String),
    SuspendProcesses(String),
    ResumeProcesses(String),
    UpdateBounds(String, ScalingBounds),
    RegisterInstance { load_balancer: String, instance: String },
    DeregisterInstance { load_balancer: String, instance: String },
    CreateStack(CreateStack),
    DeleteStack(String),
    CreateSnapshot { db_instance: String, snapshot: String },
}

/// In-memory implementation of every provider API.
#[derive(Debug, Default)]
pub struct SimulatedCloud {
    fleet: Mutex<Fleet>,
    calls: Mutex<Vec<ProviderCall>>,
    /// Resource ids whose mutations fail with a request error.
    failing: Mutex<BTreeSet<String>>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fleet(fleet: Fleet) -> Self {
        Self {
            fleet: Mutex::new(fleet),
            ..Self::default()
        }
    }

    /// Load a fleet description from a JSON file.
    pub fn load(path: &Path) -> ProviderResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProviderError::Request(format!("reading {}: {e}", path.display())))?;
        let fleet: Fleet = serde_json::from_str(&content)
            .map_err(|e| ProviderError::Request(format!("parsing {}: {e}", path.display())))?;
        Ok(Self::from_fleet(fleet))
    }

    /// Write the current fleet back as pretty JSON.
    pub fn save(&self, path: &Path) -> ProviderResult<()> {
        let content = serde_json::to_string_pretty(&self.fleet())
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| ProviderError::Request(format!("writing {}: {e}", path.display())))
    }

    // ── Builders ───────────────────────────────────────────────────

    pub fn with_instance(self, id: &str, name: &str, status: InstanceStatus) -> Self {
        guard(&self.fleet).instances.insert(
            id.to_string(),
            SimInstance {
                name: name.to_string(),
                status,
            },
        );
        self
    }

    pub fn with_group(self, name: &str, group: SimGroup) -> Self {
        {
            let mut fleet = guard(&self.fleet);
            for lb in &group.load_balancers {
                let registered = fleet.load_balancers.entry(lb.clone()).or_default();
                registered.extend(group.instances.iter().cloned());
            }
            fleet.groups.insert(name.to_string(), group);
        }
        self
    }

    pub fn with_stack(self, name: &str, stack: SimStack) -> Self {
        guard(&self.fleet).stacks.insert(name.to_string(), stack);
        self
    }

    pub fn with_snapshot(self, db_instance_id: &str, id: &str, created_at: DateTime<Utc>) -> Self {
        guard(&self.fleet).snapshots.push(DbSnapshot {
            id: id.to_string(),
            db_instance_id: db_instance_id.to_string(),
            created_at,
        });
        self
    }

    /// Make every mutation targeting `id` fail.
    pub fn fail_on(&self, id: &str) {
        guard(&self.failing).insert(id.to_string());
    }

    /// Undo [`fail_on`](Self::fail_on).
    pub fn recover(&self, id: &str) {
        guard(&self.failing).remove(id);
    }

    // ── Inspection ─────────────────────────────────────────────────

    /// A copy of the current fleet.
    pub fn fleet(&self) -> Fleet {
        guard(&self.fleet).clone()
    }

    /// Mutating calls issued so far, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        guard(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        guard(&self.calls).clear();
    }

    fn record(&self, id: &str, call: ProviderCall) -> ProviderResult<()> {
        if guard(&self.failing).contains(id) {
            return Err(ProviderError::Request(format!("injected failure for {id}")));
        }
        debug!(?call, "simulated provider call");
        guard(&self.calls).push(call);
        Ok(())
    }

    fn set_instance_status(&self, id: &str, status: InstanceStatus) -> ProviderResult<()> {
        let mut fleet = guard(&self.fleet);
        let instance = fleet
            .instances
            .get_mut(id)
            .ok_or_else(|| ProviderError::NotFound(format!("instance {id}")))?;
        instance.status = status;
        Ok(())
    }

    fn with_group_mut<F>(&self, name: &str, f: F) -> ProviderResult<()>
    where
        F: FnOnce(&mut SimGroup),
    {
        let mut fleet = guard(&self.fleet);
        let group = fleet
            .groups
            .get_mut(name)
            .ok_or_else(|| ProviderError::NotFound(format!("scaling group {name}")))?;
        f(group);
        Ok(())
    }
}

impl ComputeApi for SimulatedCloud {
    fn list_instances(&self) -> ProviderResult<Vec<InstanceInfo>> {
        Ok(guard(&self.fleet)
            .instances
            .iter()
            .filter(|(_, i)| i.status != InstanceStatus::Terminated)
            .map(|(id, i)| InstanceInfo {
                id: id.clone(),
                name: i.name.clone(),
                status: i.status,
            })
            .collect())
    }

    fn describe_instance(&self, id: &str) -> ProviderResult<Option<InstanceInfo>> {
        Ok(guard(&self.fleet).instances.get(id).map(|i| InstanceInfo {
            id: id.to_string(),
            name: i.name.clone(),
            status: i.status,
        }))
    }

    fn start_instance(&self, id: &str) -> ProviderResult<()> {
        self.record(id, ProviderCall::StartInstance(id.to_string()))?;
        self.set_instance_status(id, InstanceStatus::Running)
    }

    fn stop_instance(&self, id: &str) -> ProviderResult<()> {
        self.record(id, ProviderCall::StopInstance(id.to_string()))?;
        self.set_instance_status(id, InstanceStatus::Stopped)
    }

    fn terminate_instance(&self, id: &str) -> ProviderResult<()> {
        self.record(id, ProviderCall::TerminateInstance(id.to_string()))?;
        self.set_instance_status(id, InstanceStatus::Terminated)
    }
}

impl ScalingApi for SimulatedCloud {
    fn list_groups(&self) -> ProviderResult<Vec<ScalingGroupInfo>> {
        Ok(guard(&self.fleet)
            .groups
            .iter()
            .map(|(name, g)| group_info(name, g))
            .collect())
    }

    fn describe_group(&self, name: &str) -> ProviderResult<Option<ScalingGroupInfo>> {
        Ok(guard(&self.fleet).groups.get(name).map(|g| group_info(name, g)))
    }

    fn suspend_processes(&self, name: &str) -> ProviderResult<()> {
        self.record(name, ProviderCall::SuspendProcesses(name.to_string()))?;
        self.with_group_mut(name, |g| {
            g.suspended_processes = SCALING_PROCESSES.iter().map(|p| p.to_string()).collect();
        })
    }

    fn resume_processes(&self, name: &str) -> ProviderResult<()> {
        self.record(name, ProviderCall::ResumeProcesses(name.to_string()))?;
        self.with_group_mut(name, |g| g.suspended_processes.clear())
    }

    fn update_bounds(&self, name: &str, bounds: ScalingBounds) -> ProviderResult<()> {
        self.record(name, ProviderCall::UpdateBounds(name.to_string(), bounds))?;
        self.with_group_mut(name, |g| g.bounds = bounds)
    }

    fn register_instance(&self, load_balancer: &str, instance_id: &str) -> ProviderResult<()> {
        self.record(
            instance_id,
            ProviderCall::RegisterInstance {
                load_balancer: load_balancer.to_string(),
                instance: instance_id.to_string(),
            },
        )?;
        guard(&self.fleet)
            .load_balancers
            .entry(load_balancer.to_string())
            .or_default()
            .insert(instance_id.to_string());
        Ok(())
    }

    fn deregister_instance(&self, load_balancer: &str, instance_id: &str) -> ProviderResult<()> {
        self.record(
            instance_id,
            ProviderCall::DeregisterInstance {
                load_balancer: load_balancer.to_string(),
                instance: instance_id.to_string(),
            },
        )?;
        let mut fleet = guard(&self.fleet);
        let registered = fleet
            .load_balancers
            .get_mut(load_balancer)
            .ok_or_else(|| ProviderError::NotFound(format!("load balancer {load_balancer}")))?;
        registered.remove(instance_id);
        Ok(())
    }
}

impl StackApi for SimulatedCloud {
    fn list_stacks(&self) -> ProviderResult<Vec<StackInfo>> {
        Ok(guard(&self.fleet)
            .stacks
            .iter()
            .map(|(name, s)| stack_info(name, s))
            .collect())
    }

    fn describe_stack(&self, name: &str) -> ProviderResult<Option<StackInfo>> {
        Ok(guard(&self.fleet).stacks.get(name).map(|s| stack_info(name, s)))
    }

    fn get_template(&self, name: &str) -> ProviderResult<String> {
        guard(&self.fleet)
            .stacks
            .get(name)
            .map(|s| s.template.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("stack {name}")))
    }

    fn list_resources(&self, name: &str) -> ProviderResult<Vec<StackResource>> {
        guard(&self.fleet)
            .stacks
            .get(name)
            .map(|s| s.resources.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("stack {name}")))
    }

    fn create_stack(&self, request: &CreateStack) -> ProviderResult<()> {
        if guard(&self.fleet).stacks.contains_key(&request.name) {
            return Err(ProviderError::Request(format!(
                "stack {} already exists",
                request.name
            )));
        }
        self.record(&request.name, ProviderCall::CreateStack(request.clone()))?;
        guard(&self.fleet).stacks.insert(
            request.name.clone(),
            SimStack {
                status: CREATE_COMPLETE.to_string(),
                template: request.template.clone(),
                parameters: request.parameters.clone(),
                outputs: BTreeMap::new(),
                tags: request.tags.clone(),
                resources: Vec::new(),
            },
        );
        Ok(())
    }

    fn delete_stack(&self, name: &str) -> ProviderResult<()> {
        if !guard(&self.fleet).stacks.contains_key(name) {
            return Err(ProviderError::NotFound(format!("stack {name}")));
        }
        self.record(name, ProviderCall::DeleteStack(name.to_string()))?;
        guard(&self.fleet).stacks.remove(name);
        Ok(())
    }
}

impl DatabaseApi for SimulatedCloud {
    fn list_snapshots(&self, db_instance_id: &str) -> ProviderResult<Vec<DbSnapshot>> {
        Ok(guard(&self.fleet)
            .snapshots
            .iter()
            .filter(|s| s.db_instance_id == db_instance_id)
            .cloned()
            .collect())
    }

    fn create_snapshot(&self, db_instance_id: &str, snapshot_id: &str) -> ProviderResult<()> {
        self.record(
            db_instance_id,
            ProviderCall::CreateSnapshot {
                db_instance: db_instance_id.to_string(),
                snapshot: snapshot_id.to_string(),
            },
        )?;
        guard(&self.fleet).snapshots.push(DbSnapshot {
            id: snapshot_id.to_string(),
            db_instance_id: db_instance_id.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}

fn group_info(name: &str, group: &SimGroup) -> ScalingGroupInfo {
    ScalingGroupInfo {
        name: name.to_string(),
        bounds: group.bounds,
        suspended_processes: group.suspended_processes.clone(),
        instances: group.instances.clone(),
        load_balancers: group.load_balancers.clone(),
    }
}

fn stack_info(name: &str, stack: &SimStack) -> StackInfo {
    StackInfo {
        name: name.to_string(),
        status: stack.status.clone(),
        parameters: stack.parameters.clone(),
        outputs: stack.outputs.clone(),
        tags: stack.tags.clone(),
    }
}
