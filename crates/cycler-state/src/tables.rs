//! redb table definitions for the Cloud Cycler state store.

use redb::TableDefinition;

/// Object bodies keyed by their full object key (`<prefix>/cloudformation/...`).
pub const OBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("objects");

/// JSON-encoded overrides keyed by `{kind}/{id}`.
pub const OVERRIDES: TableDefinition<&str, &[u8]> = TableDefinition::new("overrides");
