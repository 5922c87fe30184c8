//! StateStore — redb-backed persistence of worker load records.
//!
//! Values are JSON-serialized `LoadRecord`s in redb's `&[u8]` value
//! column, keyed by worker name. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use phil_core::{LoadRecord, WorkerIdentity};

use crate::error::{StateError, StateResult};
use crate::tables::VM_LOADS;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe load-record store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "load store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory load store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(VM_LOADS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert or replace the record for `record.name`.
    pub fn put_load_record(&self, record: &LoadRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(VM_LOADS).map_err(map_err!(Table))?;
            table
                .insert(record.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(name = %record.name, load = record.load, "load record stored");
        Ok(())
    }

    pub fn get_load_record(&self, name: &str) -> StateResult<Option<LoadRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(VM_LOADS).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: LoadRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List every record, stale ones included.
    pub fn list_load_records(&self) -> StateResult<Vec<LoadRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(VM_LOADS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: LoadRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Keys of every record, without decoding the values.
    pub fn list_record_keys(&self) -> StateResult<Vec<WorkerIdentity>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(VM_LOADS).map_err(map_err!(Table))?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }

    /// Records for the given names, in the order asked for. Unknown names
    /// are skipped; duplicates are returned once.
    pub fn fetch_load_records(&self, names: &[WorkerIdentity]) -> StateResult<Vec<LoadRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(VM_LOADS).map_err(map_err!(Table))?;
        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            if let Some(guard) = table.get(name.as_str()).map_err(map_err!(Read))? {
                let record: LoadRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    /// Delete a single record. Returns true if it existed.
    pub fn delete_load_record(&self, name: &str) -> StateResult<bool> {
        Ok(self.delete_load_records(&[name.to_string()])? == 1)
    }

    /// Delete records by key in one transaction. Returns number deleted.
    pub fn delete_load_records(&self, names: &[WorkerIdentity]) -> StateResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut count = 0;
        {
            let mut table = txn.open_table(VM_LOADS).map_err(map_err!(Table))?;
            for name in names {
                if table.remove(name.as_str()).map_err(map_err!(Write))?.is_some() {
                    count += 1;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(requested = names.len(), deleted = count, "load records deleted");
        Ok(count)
    }
}
