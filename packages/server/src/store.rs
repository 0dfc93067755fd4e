//! Persistence seam for records of persistent types.
//!
//! Producers write records to the store themselves before submitting them to
//! the engine; the engine's only use of the store is reloading records that
//! arrive on the wire as bare UUIDs.

use std::collections::HashMap;

use parking_lot::RwLock;
use shardsync_core::RecordRef;
use uuid::Uuid;

/// Pluggable record store backing one or more persistent types.
///
/// `load` may block on I/O; the engine always calls it with the engine lock
/// released. Implementations: a database-backed store in the host process,
/// [`MemoryStore`] for tests and single-process setups.
pub trait Store: Send + Sync {
    /// Load a record by type name and UUID, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Whatever the backing storage reports. The engine logs the failure
    /// and skips the record.
    fn load(&self, type_name: &str, uuid: Uuid) -> anyhow::Result<Option<RecordRef>>;
}

/// In-memory [`Store`] keyed by `(type name, uuid)`.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, Uuid), RecordRef>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record under `type_name`.
    pub fn put(&self, type_name: impl Into<String>, uuid: Uuid, record: RecordRef) {
        self.records
            .write()
            .insert((type_name.into(), uuid), record);
    }

    /// Remove a record, returning it if it was present.
    pub fn remove(&self, type_name: &str, uuid: Uuid) -> Option<RecordRef> {
        self.records
            .write()
            .remove(&(type_name.to_string(), uuid))
    }

    /// Number of stored records across all types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn load(&self, type_name: &str, uuid: Uuid) -> anyhow::Result<Option<RecordRef>> {
        Ok(self
            .records
            .read()
            .get(&(type_name.to_string(), uuid))
            .cloned())
    }
}
