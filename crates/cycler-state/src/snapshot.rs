//! Stack snapshot persistence protocol.
//!
//! Saved stacks live under `<prefix>/cloudformation/<stack>/`:
//!
//! ```text
//! template.json            template body, verbatim
//! parameters.json          {"Name": "value", ...}
//! resources.json           recursive ResourceInventory
//! outputs.json             {"Name": "value", ...}
//! autoscale/<group>.json   {"min_size":..,"max_size":..,"desired_capacity":..}
//! ```
//!
//! An empty prefix stores directly under `cloudformation/`. A prefix that
//! already ends in `/` is used as-is.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::backend::ObjectStore;
use crate::error::{StateError, StateResult};
use crate::types::{ResourceInventory, ScalingBounds, StackSnapshot};

const STACK_FOLDER: &str = "cloudformation";

/// Reads and writes saved stacks in an [`ObjectStore`].
pub struct SnapshotStore<'a> {
    objects: &'a dyn ObjectStore,
    root: String,
}

impl<'a> SnapshotStore<'a> {
    pub fn new(objects: &'a dyn ObjectStore, bucket_prefix: &str) -> Self {
        let root = if bucket_prefix.is_empty() {
            STACK_FOLDER.to_string()
        } else if bucket_prefix.ends_with('/') {
            format!("{bucket_prefix}{STACK_FOLDER}")
        } else {
            format!("{bucket_prefix}/{STACK_FOLDER}")
        };
        Self { objects, root }
    }

    /// Object key for a file belonging to a stack.
    pub fn key(&self, stack: &str, path: &str) -> String {
        format!("{}/{stack}/{path}", self.root)
    }

    /// Persist all four parts of a stack snapshot.
    pub fn save(&self, stack: &str, snapshot: &StackSnapshot) -> StateResult<()> {
        self.objects
            .put_object(&self.key(stack, "template.json"), snapshot.template.as_bytes())?;
        self.put_json(&self.key(stack, "parameters.json"), &snapshot.parameters)?;
        self.put_json(&self.key(stack, "resources.json"), &snapshot.resources)?;
        self.put_json(&self.key(stack, "outputs.json"), &snapshot.outputs)?;
        debug!(%stack, root = %self.root, "stack snapshot saved");
        Ok(())
    }

    /// Load a saved stack. `None` when no template was ever saved.
    ///
    /// Snapshots written before outputs were recorded load with empty
    /// outputs; a missing parameter or resource file is an error.
    pub fn load(&self, stack: &str) -> StateResult<Option<StackSnapshot>> {
        let Some(template) = self.objects.get_object(&self.key(stack, "template.json"))? else {
            return Ok(None);
        };
        let template = String::from_utf8(template)
            .map_err(|e| StateError::decode(&self.key(stack, "template.json"), e))?;

        let parameters: BTreeMap<String, String> = self.require_json(stack, "parameters.json")?;
        let resources: ResourceInventory = self.require_json(stack, "resources.json")?;
        let outputs = self
            .get_json(&self.key(stack, "outputs.json"))?
            .unwrap_or_default();

        Ok(Some(StackSnapshot {
            template,
            parameters,
            resources,
            outputs,
        }))
    }

    pub fn save_group_bounds(
        &self,
        stack: &str,
        group: &str,
        bounds: &ScalingBounds,
    ) -> StateResult<()> {
        self.put_json(&self.key(stack, &format!("autoscale/{group}.json")), bounds)
    }

    pub fn load_group_bounds(&self, stack: &str, group: &str) -> StateResult<Option<ScalingBounds>> {
        self.get_json(&self.key(stack, &format!("autoscale/{group}.json")))
    }

    /// Names of every stack with saved state, sorted and deduplicated.
    pub fn saved_stacks(&self) -> StateResult<Vec<String>> {
        let folder = format!("{}/", self.root);
        let mut names: Vec<String> = self
            .objects
            .list_objects(&folder)?
            .iter()
            .filter_map(|key| key.strip_prefix(&folder)?.split('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StateResult<()> {
        let body = serde_json::to_vec(value).map_err(|e| StateError::encode(key, e))?;
        self.objects.put_object(key, &body)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> StateResult<Option<T>> {
        match self.objects.get_object(key)? {
            Some(body) => serde_json::from_slice(&body)
                .map(Some)
                .map_err(|e| StateError::decode(key, e)),
            None => Ok(None),
        }
    }

    fn require_json<T: DeserializeOwned>(&self, stack: &str, path: &str) -> StateResult<T> {
        let key = self.key(stack, path);
        self.get_json(&key)?.ok_or(StateError::Missing(key))
    }
}
