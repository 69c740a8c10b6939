//! Error kinds surfaced by the cycling engine.

use cycler_core::{MatcherError, ResourceKind, ScheduleError};
use cycler_provider::ProviderError;
use cycler_state::StateError;
use thiserror::Error;

pub type CycleResult<T> = Result<T, CycleError>;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("invalid schedule: {0}")]
    InvalidSchedule(#[from] ScheduleError),

    #[error("invalid selection: {0}")]
    InvalidMatcher(#[from] MatcherError),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("action {action:?} is not supported for {kind}")]
    UnsupportedAction { kind: ResourceKind, action: String },

    #[error("refusing to rebuild stack {stack}: {reason}")]
    UnsafeRebuild { stack: String, reason: String },

    #[error("no saved state for stack {0}")]
    StorageMissing(String),

    #[error("provider error: {0}")]
    Provider(ProviderError),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

impl From<ProviderError> for CycleError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(what) => CycleError::ResourceNotFound(what),
            other => CycleError::Provider(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_not_found_becomes_resource_not_found() {
        let err: CycleError = ProviderError::NotFound("instance i-1".into()).into();
        assert!(matches!(err, CycleError::ResourceNotFound(what) if what == "instance i-1"));

        let err: CycleError = ProviderError::Request("throttled".into()).into();
        assert!(matches!(err, CycleError::Provider(_)));
    }

    #[test]
    fn unsupported_action_message() {
        let err = CycleError::UnsupportedAction {
            kind: ResourceKind::ScalingGroup,
            action: "explode".into(),
        };
        assert_eq!(
            err.to_string(),
            "action \"explode\" is not supported for scaling_group"
        );
    }
}
