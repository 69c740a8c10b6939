//! Failures surfaced by the object store, override store and snapshot layer.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    /// The backing database refused an operation (open, transaction,
    /// table access, read, write or commit).
    #[error("state store {op} failed: {reason}")]
    Storage { op: &'static str, reason: String },

    /// A stored value could not be encoded or decoded.
    #[error("cannot {op} {key}: {reason}")]
    Codec {
        op: &'static str,
        key: String,
        reason: String,
    },

    /// An override key that is not `<kind>/<id>`.
    #[error("malformed override key {0:?}")]
    BadKey(String),

    /// A saved stack is missing one of its required parts.
    #[error("saved stack is incomplete, missing {0}")]
    Missing(String),
}

impl StateError {
    pub fn storage(op: &'static str, reason: impl ToString) -> Self {
        StateError::Storage {
            op,
            reason: reason.to_string(),
        }
    }

    pub fn encode(key: &str, reason: impl ToString) -> Self {
        StateError::Codec {
            op: "encode",
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(key: &str, reason: impl ToString) -> Self {
        StateError::Codec {
            op: "decode",
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_key() {
        let err = StateError::decode("p/cloudformation/app/parameters.json", "EOF");
        assert_eq!(
            err.to_string(),
            "cannot decode p/cloudformation/app/parameters.json: EOF"
        );
        assert_eq!(
            StateError::storage("commit", "disk full").to_string(),
            "state store commit failed: disk full"
        );
        assert_eq!(
            StateError::Missing("app/resources.json".into()).to_string(),
            "saved stack is incomplete, missing app/resources.json"
        );
    }
}
