//! Provider-side resource descriptions.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use cycler_core::ScalingBounds;

/// Lifecycle state of a compute instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstanceStatus::Pending => "pending",
            InstanceStatus::Running => "running",
            InstanceStatus::Stopping => "stopping",
            InstanceStatus::Stopped => "stopped",
            InstanceStatus::ShuttingDown => "shutting_down",
            InstanceStatus::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub id: String,
    /// Value of the instance's name tag; selection matches on this.
    pub name: String,
    pub status: InstanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingGroupInfo {
    pub name: String,
    pub bounds: ScalingBounds,
    /// Names of currently suspended scaling processes.
    pub suspended_processes: Vec<String>,
    /// Member instance ids.
    pub instances: Vec<String>,
    /// Names of attached load balancers.
    pub load_balancers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackInfo {
    pub name: String,
    /// Provider status string, e.g. `CREATE_COMPLETE` or `ROLLBACK_FAILED`.
    pub status: String,
    pub parameters: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl StackInfo {
    /// Terminal failure states are never remediated automatically.
    pub fn is_failed(&self) -> bool {
        self.status.ends_with("_FAILED")
    }
}

/// One resource created by a stack.
///
/// For nested stacks the physical id is the substack's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackResource {
    pub logical_id: String,
    pub resource_type: String,
    pub physical_id: String,
}

impl StackResource {
    pub fn new(logical_id: &str, resource_type: &str, physical_id: &str) -> Self {
        Self {
            logical_id: logical_id.to_string(),
            resource_type: resource_type.to_string(),
            physical_id: physical_id.to_string(),
        }
    }
}

/// Request to create a stack from a saved template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStack {
    pub name: String,
    pub template: String,
    pub parameters: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSnapshot {
    pub id: String,
    pub db_instance_id: String,
    pub created_at: DateTime<Utc>,
}
