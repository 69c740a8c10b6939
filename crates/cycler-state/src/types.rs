//! Persisted types: overrides, scaling bounds and stack snapshots.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use cycler_core::ScalingBounds;
use cycler_core::resource_types;

// ── Override ──────────────────────────────────────────────────────

/// Status value that switches a resource off the schedule entirely.
pub const DISABLED: &str = "disabled";

/// A per-resource record that replaces the task schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    /// Schedule text in the same format `Schedule::parse` accepts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Override {
    pub fn is_disabled(&self) -> bool {
        self.status.as_deref() == Some(DISABLED)
    }
}

// ── Resource inventory ────────────────────────────────────────────

/// Resources created by a stack, keyed by provider resource type.
///
/// Serialized as one JSON object. Nested stacks appear under the stack
/// type as `{substack: inventory}`, scaling groups under the group type as
/// `{group: bounds}`, and every other type as a list of physical ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceInventory {
    pub resources: BTreeMap<String, Vec<String>>,
    pub stacks: BTreeMap<String, ResourceInventory>,
    pub scaling_groups: BTreeMap<String, ScalingBounds>,
}

impl ResourceInventory {
    /// Record a plain resource. Stack and scaling group types have their
    /// own entry points.
    pub fn add_resource(&mut self, resource_type: &str, id: &str) {
        self.resources
            .entry(resource_type.to_string())
            .or_default()
            .push(id.to_string());
    }

    pub fn add_stack(&mut self, name: &str, inventory: ResourceInventory) {
        self.stacks.insert(name.to_string(), inventory);
    }

    pub fn add_scaling_group(&mut self, id: &str, bounds: ScalingBounds) {
        self.scaling_groups.insert(id.to_string(), bounds);
    }

    /// Ids of a plain resource type, including every nested stack.
    pub fn ids_of(&self, resource_type: &str) -> Vec<String> {
        let mut ids = self.resources.get(resource_type).cloned().unwrap_or_default();
        for substack in self.stacks.values() {
            ids.extend(substack.ids_of(resource_type));
        }
        ids
    }

    pub fn database_instances(&self) -> Vec<String> {
        self.ids_of(resource_types::DATABASE)
    }

    pub fn compute_instances(&self) -> Vec<String> {
        self.ids_of(resource_types::INSTANCE)
    }

    /// Every scaling group in this stack and its substacks.
    pub fn all_scaling_groups(&self) -> BTreeMap<String, ScalingBounds> {
        let mut groups = self.scaling_groups.clone();
        for substack in self.stacks.values() {
            groups.extend(substack.all_scaling_groups());
        }
        groups
    }
}

impl Serialize for ResourceInventory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut len = self.resources.len();
        len += usize::from(!self.stacks.is_empty());
        len += usize::from(!self.scaling_groups.is_empty());

        let mut map = serializer.serialize_map(Some(len))?;
        for (resource_type, ids) in &self.resources {
            map.serialize_entry(resource_type, ids)?;
        }
        if !self.stacks.is_empty() {
            map.serialize_entry(resource_types::STACK, &self.stacks)?;
        }
        if !self.scaling_groups.is_empty() {
            map.serialize_entry(resource_types::SCALING_GROUP, &self.scaling_groups)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResourceInventory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut inventory = ResourceInventory::default();
        for (resource_type, value) in raw {
            match resource_type.as_str() {
                resource_types::STACK => {
                    inventory.stacks = serde_json::from_value(value).map_err(D::Error::custom)?;
                }
                resource_types::SCALING_GROUP => {
                    inventory.scaling_groups =
                        serde_json::from_value(value).map_err(D::Error::custom)?;
                }
                _ => {
                    let ids = serde_json::from_value(value).map_err(D::Error::custom)?;
                    inventory.resources.insert(resource_type, ids);
                }
            }
        }
        Ok(inventory)
    }
}

// ── Stack snapshot ────────────────────────────────────────────────

/// Everything needed to recreate a torn-down stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackSnapshot {
    /// Template body, stored verbatim.
    pub template: String,
    pub parameters: BTreeMap<String, String>,
    pub resources: ResourceInventory,
    pub outputs: BTreeMap<String, String>,
}
