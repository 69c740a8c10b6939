//! Provider traits.
//!
//! Every call is a single synchronous request. Mutations on an absent
//! target return [`ProviderError::NotFound`](crate::ProviderError::NotFound);
//! `describe_*` calls return `Ok(None)` instead.

use crate::error::ProviderResult;
use crate::types::*;

pub trait ComputeApi {
    /// Every instance that has not been terminated.
    fn list_instances(&self) -> ProviderResult<Vec<InstanceInfo>>;
    fn describe_instance(&self, id: &str) -> ProviderResult<Option<InstanceInfo>>;
    fn start_instance(&self, id: &str) -> ProviderResult<()>;
    fn stop_instance(&self, id: &str) -> ProviderResult<()>;
    fn terminate_instance(&self, id: &str) -> ProviderResult<()>;
}

pub trait ScalingApi {
    fn list_groups(&self) -> ProviderResult<Vec<ScalingGroupInfo>>;
    fn describe_group(&self, name: &str) -> ProviderResult<Option<ScalingGroupInfo>>;
    fn suspend_processes(&self, name: &str) -> ProviderResult<()>;
    fn resume_processes(&self, name: &str) -> ProviderResult<()>;
    fn update_bounds(&self, name: &str, bounds: ScalingBounds) -> ProviderResult<()>;
    fn register_instance(&self, load_balancer: &str, instance_id: &str) -> ProviderResult<()>;
    fn deregister_instance(&self, load_balancer: &str, instance_id: &str) -> ProviderResult<()>;
}

pub trait StackApi {
    fn list_stacks(&self) -> ProviderResult<Vec<StackInfo>>;
    fn describe_stack(&self, name: &str) -> ProviderResult<Option<StackInfo>>;
    fn get_template(&self, name: &str) -> ProviderResult<String>;
    fn list_resources(&self, name: &str) -> ProviderResult<Vec<StackResource>>;
    fn create_stack(&self, request: &CreateStack) -> ProviderResult<()>;
    fn delete_stack(&self, name: &str) -> ProviderResult<()>;
}

pub trait DatabaseApi {
    /// Snapshots taken from one database instance.
    fn list_snapshots(&self, db_instance_id: &str) -> ProviderResult<Vec<DbSnapshot>>;
    fn create_snapshot(&self, db_instance_id: &str, snapshot_id: &str) -> ProviderResult<()>;
}

/// The four provider handles a run needs, borrowed for its duration.
#[derive(Clone, Copy)]
pub struct Clients<'a> {
    pub compute: &'a dyn ComputeApi,
    pub scaling: &'a dyn ScalingApi,
    pub stacks: &'a dyn StackApi,
    pub databases: &'a dyn DatabaseApi,
}

impl<'a> Clients<'a> {
    /// Borrow one value that implements every API.
    pub fn from_cloud<C>(cloud: &'a C) -> Self
    where
        C: ComputeApi + ScalingApi + StackApi + DatabaseApi,
    {
        Self {
            compute: cloud,
            scaling: cloud,
            stacks: cloud,
            databases: cloud,
        }
    }
}
