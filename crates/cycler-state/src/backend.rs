//! Storage seams consumed by the cycling engine.
//!
//! Both traits are object safe so the engine can hold `&dyn` references and
//! tests can substitute fakes.

use cycler_core::ResourceKind;

use crate::error::StateResult;
use crate::types::Override;

/// A flat object store: opaque bodies under string keys.
pub trait ObjectStore {
    /// Fetch an object body, `None` if the key is absent.
    fn get_object(&self, key: &str) -> StateResult<Option<Vec<u8>>>;
    /// Create or replace an object.
    fn put_object(&self, key: &str, body: &[u8]) -> StateResult<()>;
    /// All keys starting with `prefix`, in key order.
    fn list_objects(&self, prefix: &str) -> StateResult<Vec<String>>;
    /// Remove an object. Returns true if it existed.
    fn delete_object(&self, key: &str) -> StateResult<bool>;
}

/// Per-resource overrides of the task schedule.
pub trait OverrideStore {
    fn get_override(&self, kind: ResourceKind, id: &str) -> StateResult<Option<Override>>;
}
