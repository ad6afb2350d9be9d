use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{error, warn};

use crate::collection::{Collection, LocalId};
use crate::error::SyncError;
use crate::resolver::{resolve_references, ForeignRef, NaturalKeyLookup};
use crate::store::{BulkUpsert, Resolved};

/// A payload record that can be reconciled into its collection.
pub trait SyncRecord: Send + Sync + 'static {
    const COLLECTION: Collection;

    fn local_id(&self) -> LocalId;

    /// Parent rows this record points at. Unset optional parents are omitted.
    fn foreign_refs(&self) -> Vec<ForeignRef> {
        Vec::new()
    }
}

/// What happened to one collection of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOutcome {
    pub collection: Collection,
    pub synced: usize,
    pub successful: Vec<LocalId>,
    pub failed: Vec<LocalId>,
    pub errors: Vec<SyncError>,
}

impl CollectionOutcome {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            synced: 0,
            successful: Vec::new(),
            failed: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn has_critical_errors(&self) -> bool {
        self.errors.iter().any(SyncError::is_critical)
    }
}

/// Reconciles one collection inside `session`.
///
/// Records whose references do not resolve are skipped with a
/// [`SyncError::MissingReference`] each; the rest are upserted in one bulk
/// write. A record repeated in the batch is written once with the data of its
/// last occurrence.
pub async fn sync_collection<R, S>(
    session: &mut S,
    records: &[R],
    synced_at: DateTime<Utc>,
) -> CollectionOutcome
where
    R: SyncRecord,
    S: NaturalKeyLookup + BulkUpsert<R> + ?Sized,
{
    let collection = R::COLLECTION;
    let mut outcome = CollectionOutcome::new(collection);
    if records.is_empty() {
        return outcome;
    }

    let references = records.iter().flat_map(R::foreign_refs);
    let keys = match resolve_references(&mut *session, references).await {
        Ok(keys) => keys,
        Err(err) => {
            error!(
                collection = collection.key(),
                error = %err,
                "failed to resolve references"
            );
            outcome.failed = unique_ids(records.iter().map(R::local_id));
            outcome.errors.push(SyncError::from_store(collection, err));
            return outcome;
        }
    };

    let mut valid: Vec<Resolved<'_, R>> = Vec::with_capacity(records.len());
    let mut positions: HashMap<LocalId, usize> = HashMap::new();
    for record in records {
        let mut resolved = Vec::new();
        let mut missing = Vec::new();
        for reference in record.foreign_refs() {
            match keys.get(reference) {
                Some(id) => resolved.push((reference.target, id)),
                None => missing.push(reference),
            }
        }

        if !missing.is_empty() {
            if !outcome.failed.contains(&record.local_id()) {
                outcome.failed.push(record.local_id());
            }
            outcome
                .errors
                .extend(missing.into_iter().map(|reference| SyncError::MissingReference {
                    collection,
                    local_id: record.local_id(),
                    target: reference.target,
                    target_local_id: reference.local_id,
                }));
            continue;
        }

        let row = Resolved::new(record, resolved);
        match positions.get(&record.local_id()) {
            Some(&index) => valid[index] = row,
            None => {
                positions.insert(record.local_id(), valid.len());
                valid.push(row);
            }
        }
    }

    if !outcome.failed.is_empty() {
        warn!(
            collection = collection.key(),
            skipped = outcome.failed.len(),
            "skipping records with missing references"
        );
    }
    if valid.is_empty() {
        return outcome;
    }

    match BulkUpsert::<R>::upsert_by_local_id(session, &valid, synced_at).await {
        Ok(()) => {
            outcome.synced = valid.len();
            outcome
                .successful
                .extend(valid.iter().map(|row| row.record.local_id()));
        }
        Err(err) => {
            error!(
                collection = collection.key(),
                rows = valid.len(),
                error = %err,
                "bulk upsert failed"
            );
            outcome
                .failed
                .extend(valid.iter().map(|row| row.record.local_id()));
            outcome.errors.push(SyncError::from_store(collection, err));
        }
    }
    outcome
}

fn unique_ids(ids: impl Iterator<Item = LocalId>) -> Vec<LocalId> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
