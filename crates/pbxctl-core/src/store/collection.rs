// ── Generic record collection ──
//
// Concurrent storage with O(1) lookups by id and by natural key. The key
// index is claimed through `DashMap::entry`, so two concurrent inserts of
// the same natural key cannot both succeed.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

use crate::model::{Record, RecordId};

/// Why a write was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteConflict {
    /// Another record already owns the natural key.
    KeyTaken { key: String, owner: RecordId },
    /// No record with the given id.
    Missing,
}

/// Concurrent storage for a single record type.
pub(crate) struct RecordCollection<R: Record> {
    /// Primary storage: id -> record.
    by_id: DashMap<RecordId, Arc<R>>,

    /// Unique index: natural key -> id.
    key_to_id: DashMap<String, RecordId>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,
}

impl<R: Record> RecordCollection<R> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);

        Self {
            by_id: DashMap::new(),
            key_to_id: DashMap::new(),
            version,
        }
    }

    /// Insert a new record, claiming its natural key.
    pub(crate) fn insert(&self, record: R) -> Result<Arc<R>, WriteConflict> {
        let id = record.id();
        let key = record.natural_key();

        match self.key_to_id.entry(key.clone()) {
            Entry::Occupied(existing) => {
                return Err(WriteConflict::KeyTaken {
                    key,
                    owner: *existing.get(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let record = Arc::new(record);
        self.by_id.insert(id, Arc::clone(&record));
        self.bump_version();
        Ok(record)
    }

    /// Replace an existing record, moving its key index if the key changed.
    pub(crate) fn replace(&self, record: R) -> Result<Arc<R>, WriteConflict> {
        let id = record.id();
        let new_key = record.natural_key();
        let old_key = self
            .by_id
            .get(&id)
            .map(|r| r.natural_key())
            .ok_or(WriteConflict::Missing)?;

        if new_key != old_key {
            match self.key_to_id.entry(new_key.clone()) {
                Entry::Occupied(existing) if *existing.get() != id => {
                    return Err(WriteConflict::KeyTaken {
                        key: new_key,
                        owner: *existing.get(),
                    });
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
            self.key_to_id.remove_if(&old_key, |_, owner| *owner == id);
        }

        let record = Arc::new(record);
        self.by_id.insert(id, Arc::clone(&record));
        self.bump_version();
        Ok(record)
    }

    /// Remove a record by id. Returns the removed record if it existed.
    pub(crate) fn remove(&self, id: &RecordId) -> Option<Arc<R>> {
        let (_, removed) = self.by_id.remove(id)?;
        self.key_to_id
            .remove_if(&removed.natural_key(), |_, owner| owner == id);
        self.bump_version();
        Some(removed)
    }

    pub(crate) fn get(&self, id: &RecordId) -> Option<Arc<R>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn get_by_key(&self, key: &str) -> Option<Arc<R>> {
        let id = *self.key_to_id.get(key)?;
        self.get(&id)
    }

    /// All records, ordered by natural key.
    pub(crate) fn values(&self) -> Vec<Arc<R>> {
        let mut values: Vec<Arc<R>> = self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by_key(|r| r.natural_key());
        values
    }

    /// Replace the whole contents, e.g. when loading a snapshot.
    pub(crate) fn load(&self, records: Vec<R>) -> Result<(), WriteConflict> {
        self.by_id.clear();
        self.key_to_id.clear();
        for record in records {
            self.insert(record)?;
        }
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}
