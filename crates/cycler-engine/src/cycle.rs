//! The start/stop contract every resource adapter implements.

use std::str::FromStr;

use cycler_core::ResourceKind;

use crate::context::RunContext;
use crate::error::{CycleError, CycleResult};
use crate::instance::Instance;
use crate::scaling_group::ScalingGroup;
use crate::stack::Stack;

/// Drive a resource on or off.
///
/// Both directions are idempotent: a resource already in the wanted state
/// is left alone and no provider mutation is issued.
pub trait Cycle {
    /// Action names accepted for this kind of resource.
    type Action: FromStr<Err = CycleError>;

    fn start(&self, action: Self::Action) -> CycleResult<()>;
    fn stop(&self, action: Self::Action) -> CycleResult<()>;
}

/// Which way a pass drives a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Start,
    Stop,
}

impl Direction {
    pub fn from_active(active: bool) -> Self {
        if active { Direction::Start } else { Direction::Stop }
    }
}

/// Parse `action` for the resource and run it in `direction`.
pub fn transition<C: Cycle>(resource: &C, action: &str, direction: Direction) -> CycleResult<()> {
    let action = action.parse::<C::Action>()?;
    match direction {
        Direction::Start => resource.start(action),
        Direction::Stop => resource.stop(action),
    }
}

/// Route a selected resource to the adapter for its kind.
pub fn dispatch(
    ctx: &RunContext<'_>,
    kind: ResourceKind,
    id: &str,
    action: &str,
    direction: Direction,
) -> CycleResult<()> {
    match kind {
        ResourceKind::Instance => transition(&Instance::by_name(ctx, id)?, action, direction),
        ResourceKind::ScalingGroup => transition(&ScalingGroup::new(ctx, id), action, direction),
        ResourceKind::Stack => transition(&Stack::new(ctx, id), action, direction),
    }
}

pub(crate) fn unsupported(kind: ResourceKind, action: &str) -> CycleError {
    CycleError::UnsupportedAction {
        kind,
        action: action.to_string(),
    }
}
