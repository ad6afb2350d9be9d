//! In-process [`SyncStore`] with fault injection for engine tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::collection::{Collection, KeyMap, LocalId, SurrogateId};
use crate::error::StoreError;
use crate::resolver::NaturalKeyLookup;
use crate::store::{BulkUpsert, Resolved, SyncSession, SyncStore};
use crate::syncer::SyncRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: SurrogateId,
    pub local_id: LocalId,
    pub references: Vec<(Collection, SurrogateId)>,
    pub data: serde_json::Value,
    pub last_synced_at: DateTime<Utc>,
    pub writes: u32,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: HashMap<Collection, BTreeMap<LocalId, StoredRow>>,
    next_id: SurrogateId,
}

impl Tables {
    fn has_surrogate(&self, collection: Collection, id: SurrogateId) -> bool {
        self.rows
            .get(&collection)
            .is_some_and(|table| table.values().any(|row| row.id == id))
    }

    fn allocate(&mut self) -> SurrogateId {
        self.next_id += 1;
        // Offset so surrogate ids never coincide with the small natural keys tests use.
        self.next_id + 1000
    }
}

#[derive(Debug, Default)]
struct Faults {
    begin: Option<StoreError>,
    commit: Option<StoreError>,
    lookups: HashMap<Collection, StoreError>,
    upserts: HashMap<Collection, StoreError>,
    last_synced: HashMap<Collection, StoreError>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Mutex<Faults>>,
    lookups: Arc<Mutex<Vec<(Collection, Vec<LocalId>)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row as if an earlier sync had written it.
    pub fn seed(
        &self,
        collection: Collection,
        local_id: LocalId,
        synced_at: DateTime<Utc>,
    ) -> SurrogateId {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.allocate();
        tables.rows.entry(collection).or_default().insert(
            local_id,
            StoredRow {
                id,
                local_id,
                references: Vec::new(),
                data: serde_json::Value::Null,
                last_synced_at: synced_at,
                writes: 1,
            },
        );
        id
    }

    pub fn rows(&self, collection: Collection) -> Vec<StoredRow> {
        self.tables
            .lock()
            .unwrap()
            .rows
            .get(&collection)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn row(&self, collection: Collection, local_id: LocalId) -> Option<StoredRow> {
        self.tables
            .lock()
            .unwrap()
            .rows
            .get(&collection)
            .and_then(|table| table.get(&local_id).cloned())
    }

    pub fn lookups(&self) -> Vec<(Collection, Vec<LocalId>)> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn fail_begin(&self, err: StoreError) {
        self.faults.lock().unwrap().begin = Some(err);
    }

    pub fn fail_commit(&self, err: StoreError) {
        self.faults.lock().unwrap().commit = Some(err);
    }

    pub fn fail_lookups(&self, collection: Collection, err: StoreError) {
        self.faults.lock().unwrap().lookups.insert(collection, err);
    }

    pub fn fail_upserts(&self, collection: Collection, err: StoreError) {
        self.faults.lock().unwrap().upserts.insert(collection, err);
    }

    pub fn fail_last_synced(&self, collection: Collection, err: StoreError) {
        self.faults.lock().unwrap().last_synced.insert(collection, err);
    }
}

/// Works on a snapshot of the store; nothing is visible until commit.
pub struct MemorySession {
    store: MemoryStore,
    working: Tables,
}

#[async_trait]
impl SyncStore for MemoryStore {
    type Session = MemorySession;

    async fn begin(&self) -> Result<MemorySession, StoreError> {
        if let Some(err) = self.faults.lock().unwrap().begin.clone() {
            return Err(err);
        }
        let working = self.tables.lock().unwrap().clone();
        Ok(MemorySession {
            store: self.clone(),
            working,
        })
    }

    async fn max_last_synced_at(
        &self,
        collection: Collection,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        if let Some(err) = self.faults.lock().unwrap().last_synced.get(&collection) {
            return Err(err.clone());
        }
        Ok(self
            .tables
            .lock()
            .unwrap()
            .rows
            .get(&collection)
            .and_then(|table| table.values().map(|row| row.last_synced_at).max()))
    }
}

#[async_trait]
impl NaturalKeyLookup for MemorySession {
    async fn find_by_local_ids(
        &mut self,
        collection: Collection,
        local_ids: &[LocalId],
    ) -> Result<KeyMap, StoreError> {
        self.store
            .lookups
            .lock()
            .unwrap()
            .push((collection, local_ids.to_vec()));
        if let Some(err) = self.store.faults.lock().unwrap().lookups.get(&collection) {
            return Err(err.clone());
        }
        let Some(table) = self.working.rows.get(&collection) else {
            return Ok(KeyMap::new());
        };
        Ok(local_ids
            .iter()
            .filter_map(|local_id| table.get(local_id).map(|row| (*local_id, row.id)))
            .collect())
    }
}

#[async_trait]
impl<R> BulkUpsert<R> for MemorySession
where
    R: SyncRecord + Serialize,
{
    async fn upsert_by_local_id<'a>(
        &mut self,
        rows: &[Resolved<'a, R>],
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(err) = self.store.faults.lock().unwrap().upserts.get(&R::COLLECTION) {
            return Err(err.clone());
        }
        for row in rows {
            for (target, id) in row.references() {
                if !self.working.has_surrogate(*target, *id) {
                    return Err(StoreError::MissingReference(format!(
                        "{} row {id} does not exist",
                        target.table()
                    )));
                }
            }
        }

        for row in rows {
            let local_id = row.record.local_id();
            let data = serde_json::to_value(row.record)
                .map_err(|err| StoreError::Database(err.to_string()))?;
            let existing = self
                .working
                .rows
                .get(&R::COLLECTION)
                .and_then(|table| table.get(&local_id))
                .map(|row| (row.id, row.writes));
            let (id, writes) = match existing {
                Some((id, writes)) => (id, writes + 1),
                None => (self.working.allocate(), 1),
            };
            let table = self.working.rows.entry(R::COLLECTION).or_default();
            table.insert(
                local_id,
                StoredRow {
                    id,
                    local_id,
                    references: row.references().to_vec(),
                    data,
                    last_synced_at: synced_at,
                    writes,
                },
            );
        }
        Ok(())
    }
}

#[async_trait]
impl SyncSession for MemorySession {
    async fn commit(self) -> Result<(), StoreError> {
        if let Some(err) = self.store.faults.lock().unwrap().commit.clone() {
            return Err(err);
        }
        *self.store.tables.lock().unwrap() = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
