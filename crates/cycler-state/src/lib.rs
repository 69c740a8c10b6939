//! cycler-state: persisted state for Cloud Cycler.
//!
//! Two collaborator seams live here:
//!
//! - [`ObjectStore`]: a flat key → bytes store (an object bucket) holding
//!   saved stack templates, parameters, resource inventories, outputs and
//!   per-group scaling bounds. [`SnapshotStore`] layers the key layout and
//!   JSON encoding on top.
//! - [`OverrideStore`]: per-resource schedule overrides keyed by
//!   `(kind, id)`.
//!
//! [`StateStore`] implements both on top of [redb](https://docs.rs/redb),
//! on disk or in memory (the latter for tests).

pub mod backend;
pub mod error;
pub mod snapshot;
pub mod store;
pub mod tables;
pub mod types;

pub use backend::{ObjectStore, OverrideStore};
pub use error::{StateError, StateResult};
pub use snapshot::SnapshotStore;
pub use store::StateStore;
pub use types::*;
