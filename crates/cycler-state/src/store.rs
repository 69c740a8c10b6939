//! StateStore: redb-backed object and override storage.
//!
//! Object bodies are stored as raw bytes; overrides are JSON-serialized
//! into redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use cycler_core::{ResourceKind, ResourceRef};

use crate::backend::{ObjectStore, OverrideStore};
use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::Override;

/// Wrap a redb failure as [`StateError::Storage`] tagged with the step that failed.
macro_rules! map_err {
    ($op:literal) => {
        |e| StateError::storage($op, e)
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

fn override_key(kind: ResourceKind, id: &str) -> String {
    format!("{kind}/{id}")
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!("open"))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!("open"))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        txn.open_table(OBJECTS).map_err(map_err!("table"))?;
        txn.open_table(OVERRIDES).map_err(map_err!("table"))?;
        txn.commit().map_err(map_err!("commit"))?;
        Ok(())
    }

    // ── Overrides ──────────────────────────────────────────────────

    /// Insert or replace the override for a resource.
    pub fn put_override(&self, kind: ResourceKind, id: &str, record: &Override) -> StateResult<()> {
        let key = override_key(kind, id);
        let value = serde_json::to_vec(record).map_err(|e| StateError::encode(&key, e))?;
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        {
            let mut table = txn.open_table(OVERRIDES).map_err(map_err!("table"))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!("write"))?;
        }
        txn.commit().map_err(map_err!("commit"))?;
        debug!(%key, "override stored");
        Ok(())
    }

    /// Remove the override for a resource. Returns true if it existed.
    pub fn delete_override(&self, kind: ResourceKind, id: &str) -> StateResult<bool> {
        let key = override_key(kind, id);
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        let existed;
        {
            let mut table = txn.open_table(OVERRIDES).map_err(map_err!("table"))?;
            existed = table.remove(key.as_str()).map_err(map_err!("write"))?.is_some();
        }
        txn.commit().map_err(map_err!("commit"))?;
        debug!(%key, existed, "override deleted");
        Ok(existed)
    }

    /// List every override.
    pub fn list_overrides(&self) -> StateResult<Vec<(ResourceRef, Override)>> {
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(OVERRIDES).map_err(map_err!("table"))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!("read"))? {
            let (key, value) = entry.map_err(map_err!("read"))?;
            let key = key.value();
            let (kind, id) = key
                .split_once('/')
                .ok_or_else(|| StateError::BadKey(key.to_string()))?;
            let kind = kind
                .parse::<ResourceKind>()
                .map_err(|_| StateError::BadKey(key.to_string()))?;
            let record: Override =
                serde_json::from_slice(value.value()).map_err(|e| StateError::decode(key, e))?;
            results.push((ResourceRef::new(kind, id), record));
        }
        Ok(results)
    }
}

impl OverrideStore for StateStore {
    fn get_override(&self, kind: ResourceKind, id: &str) -> StateResult<Option<Override>> {
        let key = override_key(kind, id);
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(OVERRIDES).map_err(map_err!("table"))?;
        match table.get(key.as_str()).map_err(map_err!("read"))? {
            Some(guard) => {
                let record: Override = serde_json::from_slice(guard.value())
                    .map_err(|e| StateError::decode(&key, e))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

impl ObjectStore for StateStore {
    fn get_object(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(OBJECTS).map_err(map_err!("table"))?;
        Ok(table
            .get(key)
            .map_err(map_err!("read"))?
            .map(|guard| guard.value().to_vec()))
    }

    fn put_object(&self, key: &str, body: &[u8]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        {
            let mut table = txn.open_table(OBJECTS).map_err(map_err!("table"))?;
            table.insert(key, body).map_err(map_err!("write"))?;
        }
        txn.commit().map_err(map_err!("commit"))?;
        debug!(%key, bytes = body.len(), "object stored");
        Ok(())
    }

    fn list_objects(&self, prefix: &str) -> StateResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(OBJECTS).map_err(map_err!("table"))?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(map_err!("read"))? {
            let (key, _) = entry.map_err(map_err!("read"))?;
            if key.value().starts_with(prefix) {
                keys.push(key.value().to_string());
            }
        }
        Ok(keys)
    }

    fn delete_object(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        let existed;
        {
            let mut table = txn.open_table(OBJECTS).map_err(map_err!("table"))?;
            existed = table.remove(key).map_err(map_err!("write"))?.is_some();
        }
        txn.commit().map_err(map_err!("commit"))?;
        Ok(existed)
    }
}
