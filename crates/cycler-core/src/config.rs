//! cycler.toml configuration parser.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::schedule::Schedule;
use crate::types::{Matcher, ResourceKind};

/// Grace period after restarting scaling group instances.
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CyclerConfig {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    /// Prefix (folder) prepended to every object-store key.
    pub bucket_prefix: Option<String>,
    #[serde(default)]
    pub dryrun: bool,
    /// Location of the local state database.
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    pub schedule: Option<String>,
    pub bucket_prefix: Option<String>,
    pub dryrun: Option<bool>,
    /// Template parameter that receives the database snapshot id on rebuild.
    pub rds_snapshot_parameter: Option<String>,
    pub grace_period_secs: Option<u64>,
    #[serde(default)]
    pub instances: SelectionConfig,
    #[serde(default)]
    pub scaling_groups: SelectionConfig,
    #[serde(default)]
    pub stacks: SelectionConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub action: Option<String>,
}

impl CyclerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: CyclerConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Check every schedule and matcher up front.
    ///
    /// The run driver tolerates a broken task, but `check` reports all of
    /// them at once.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut names = HashSet::new();
        for task in &self.tasks {
            if task.name.is_empty() {
                bail!("task with empty name");
            }
            if !names.insert(task.name.as_str()) {
                bail!("duplicate task name {:?}", task.name);
            }
            task.parsed_schedule()
                .with_context(|| format!("task {:?}", task.name))?;
            for kind in ResourceKind::ALL {
                let selection = task.selection(kind);
                selection
                    .includes()
                    .and(selection.excludes())
                    .with_context(|| format!("task {:?} {kind} selection", task.name))?;
            }
        }
        Ok(())
    }

    /// Effective object-store prefix for a task.
    pub fn bucket_prefix_for(&self, task: &TaskConfig) -> String {
        task.bucket_prefix
            .clone()
            .or_else(|| self.defaults.bucket_prefix.clone())
            .unwrap_or_default()
    }

    pub fn dryrun_for(&self, task: &TaskConfig) -> bool {
        task.dryrun.unwrap_or(self.defaults.dryrun)
    }
}

impl TaskConfig {
    pub fn selection(&self, kind: ResourceKind) -> &SelectionConfig {
        match kind {
            ResourceKind::Instance => &self.instances,
            ResourceKind::ScalingGroup => &self.scaling_groups,
            ResourceKind::Stack => &self.stacks,
        }
    }

    /// The configured action name for a kind, `"default"` when unset.
    pub fn action(&self, kind: ResourceKind) -> &str {
        self.selection(kind).action.as_deref().unwrap_or("default")
    }

    pub fn parsed_schedule(&self) -> anyhow::Result<Option<Schedule>> {
        Ok(self
            .schedule
            .as_deref()
            .map(Schedule::parse)
            .transpose()?)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs.unwrap_or(DEFAULT_GRACE_PERIOD_SECS))
    }
}

impl SelectionConfig {
    pub fn includes(&self) -> anyhow::Result<Vec<Matcher>> {
        parse_matchers(&self.include)
    }

    pub fn excludes(&self) -> anyhow::Result<Vec<Matcher>> {
        parse_matchers(&self.exclude)
    }
}

fn parse_matchers(raw: &[String]) -> anyhow::Result<Vec<Matcher>> {
    raw.iter()
        .map(|text| Matcher::parse(text).map_err(anyhow::Error::from))
        .collect()
}
