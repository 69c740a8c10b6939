//! Tasks: a schedule plus a selection of resources per kind.
//!
//! Selection is built from include and exclude rules. Includes resolve
//! against the run's inventory; excludes remove matching ids already
//! included and block later includes, so the outcome does not depend on the
//! order rules were applied in.

use std::collections::BTreeMap;
use std::fmt;

use cycler_core::{Matcher, ResourceKind, ResourceRef, Schedule, TaskConfig};
use tracing::{debug, error, info, warn};

use crate::context::RunContext;
use crate::cycle::{Direction, dispatch};
use crate::error::{CycleError, CycleResult};

#[derive(Debug, Clone)]
pub struct Task {
    name: String,
    schedule: Option<Schedule>,
    actions: BTreeMap<ResourceKind, String>,
    includes: BTreeMap<ResourceKind, Vec<String>>,
    excludes: BTreeMap<ResourceKind, Vec<Matcher>>,
}

impl Task {
    pub fn new(name: impl Into<String>, schedule: Option<Schedule>) -> Self {
        Self {
            name: name.into(),
            schedule,
            actions: BTreeMap::new(),
            includes: BTreeMap::new(),
            excludes: BTreeMap::new(),
        }
    }

    /// Build a task from configuration, resolving its selection against
    /// the context's inventories.
    pub fn from_config(config: &TaskConfig, ctx: &RunContext<'_>) -> CycleResult<Self> {
        let schedule = config.schedule.as_deref().map(Schedule::parse).transpose()?;
        let mut task = Task::new(&config.name, schedule);

        for kind in ResourceKind::ALL {
            let selection = config.selection(kind);
            if let Some(action) = &selection.action {
                task = task.with_action(kind, action);
            }
            for text in &selection.exclude {
                task.exclude(kind, Matcher::parse(text)?);
            }
            for text in &selection.include {
                task.include(kind, &Matcher::parse(text)?, ctx)?;
            }
        }
        Ok(task)
    }

    pub fn with_action(mut self, kind: ResourceKind, action: impl Into<String>) -> Self {
        self.actions.insert(kind, action.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    /// Action name for a kind, `"default"` unless configured.
    pub fn action(&self, kind: ResourceKind) -> &str {
        self.actions.get(&kind).map_or("default", String::as_str)
    }

    /// Ids currently selected for a kind, in the order they were added.
    pub fn included(&self, kind: ResourceKind) -> &[String] {
        self.includes
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn is_excluded(&self, kind: ResourceKind, id: &str) -> bool {
        self.excludes
            .get(&kind)
            .is_some_and(|rules| rules.iter().any(|rule| rule.matches(id)))
    }

    /// Select every inventory id matching `matcher` that is not excluded.
    pub fn include(
        &mut self,
        kind: ResourceKind,
        matcher: &Matcher,
        ctx: &RunContext<'_>,
    ) -> CycleResult<()> {
        let matched: Vec<String> = ctx
            .inventory(kind)?
            .into_iter()
            .filter(|id| matcher.matches(id))
            .filter(|id| !self.is_excluded(kind, id))
            .map(str::to_string)
            .collect();

        let included = self.includes.entry(kind).or_default();
        for id in matched {
            if !included.contains(&id) {
                included.push(id);
            }
        }
        Ok(())
    }

    /// Exclude matching ids, including ones selected earlier.
    pub fn exclude(&mut self, kind: ResourceKind, matcher: Matcher) {
        if let Some(included) = self.includes.get_mut(&kind) {
            included.retain(|id| !matcher.matches(id));
        }
        self.excludes.entry(kind).or_default().push(matcher);
    }

    /// Drive every selected resource to its scheduled state.
    ///
    /// Failures are logged and recorded per resource; they never stop the
    /// rest of the pass.
    pub fn run(&self, ctx: &RunContext<'_>) -> RunReport {
        let mut report = RunReport::new(&self.name);
        for kind in ResourceKind::ALL {
            for id in self.included(kind) {
                let outcome = match self.cycle(ctx, kind, id) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        error!(%kind, %id, error = %err, "failed to cycle resource");
                        Outcome::Failed(err.to_string())
                    }
                };
                report.record(ResourceRef::new(kind, id.as_str()), outcome);
            }
        }
        info!(
            task = %self.name,
            started = report.count(|o| *o == Outcome::Started),
            stopped = report.count(|o| *o == Outcome::Stopped),
            failed = report.failures().count(),
            "task pass complete"
        );
        report
    }

    fn cycle(&self, ctx: &RunContext<'_>, kind: ResourceKind, id: &str) -> CycleResult<Outcome> {
        let record = ctx.overrides.get_override(kind, id)?.unwrap_or_default();
        if record.is_disabled() {
            info!(%kind, %id, "disabled by override");
            return Ok(Outcome::Disabled);
        }

        let schedule = match record.schedule.as_deref() {
            Some(text) => Some(Schedule::parse(text)?),
            None => self.schedule,
        };
        let Some(schedule) = schedule else {
            warn!(%kind, %id, "no schedule, skipping");
            return Ok(Outcome::Unscheduled);
        };

        let direction = Direction::from_active(schedule.is_active_at(&ctx.now));
        debug!(%kind, %id, %schedule, ?direction, "evaluated schedule");
        dispatch(ctx, kind, id, self.action(kind), direction)?;
        Ok(match direction {
            Direction::Start => Outcome::Started,
            Direction::Stop => Outcome::Stopped,
        })
    }
}

/// What a pass did with one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Scheduled on; driven to (or left in) the running state.
    Started,
    /// Scheduled off; driven to (or left in) the stopped state.
    Stopped,
    Disabled,
    Unscheduled,
    Failed(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Started => f.write_str("started"),
            Outcome::Stopped => f.write_str("stopped"),
            Outcome::Disabled => f.write_str("disabled"),
            Outcome::Unscheduled => f.write_str("unscheduled"),
            Outcome::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub task: String,
    pub entries: Vec<(ResourceRef, Outcome)>,
}

impl RunReport {
    pub fn new(task: &str) -> Self {
        Self {
            task: task.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, resource: ResourceRef, outcome: Outcome) {
        self.entries.push((resource, outcome));
    }

    pub fn outcome(&self, kind: ResourceKind, id: &str) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|(r, _)| r.kind == kind && r.id == id)
            .map(|(_, outcome)| outcome)
    }

    pub fn count<F: Fn(&Outcome) -> bool>(&self, pred: F) -> usize {
        self.entries.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ResourceRef, &str)> {
        self.entries.iter().filter_map(|(r, o)| match o {
            Outcome::Failed(err) => Some((r, err.as_str())),
            _ => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

impl From<CycleError> for Outcome {
    fn from(err: CycleError) -> Self {
        Outcome::Failed(err.to_string())
    }
}
