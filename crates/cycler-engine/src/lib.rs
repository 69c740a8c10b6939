//! cycler-engine: drives cloud resources on and off a weekly schedule.
//!
//! A pass works task by task. Each task resolves its include and exclude
//! rules against the live inventory, evaluates its schedule (or a
//! per-resource override) against a single run clock, and hands every
//! selected resource to the adapter for its kind:
//!
//! - [`Instance`]: start a stopped instance, stop a running one.
//! - [`ScalingGroup`]: suspend processes and stop or terminate members;
//!   restart members, re-register them with load balancers and resume.
//! - [`Stack`]: tear down and rebuild from saved state when that is safe,
//!   otherwise scale nested groups down to zero and back up.
//!
//! Everything a pass reads is cached in its [`RunContext`] and discarded
//! afterwards.

pub mod context;
pub mod cycle;
pub mod error;
pub mod graph;
pub mod instance;
pub mod runner;
pub mod scaling_group;
pub mod stack;
pub mod task;

pub use context::{RunContext, TaskSettings};
pub use cycle::{Cycle, Direction, dispatch};
pub use error::{CycleError, CycleResult};
pub use graph::{DependencyGraph, DependencyNode};
pub use instance::{Instance, InstanceAction};
pub use runner::{Environment, TaskRun};
pub use scaling_group::{GroupAction, ScalingGroup};
pub use stack::{Stack, StackAction, StackState};
pub use task::{Outcome, RunReport, Task};
