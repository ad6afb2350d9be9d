//! Capabilities the reconciliation engine needs from a persistence backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::collection::{Collection, SurrogateId};
use crate::error::StoreError;
use crate::payload::{
    AttendanceRecord, HealthMetricRecord, MemberRecord, ServiceRecord, StaffAttendanceRecord,
    StaffRecord, TransactionRecord,
};
use crate::resolver::NaturalKeyLookup;
use crate::syncer::SyncRecord;

/// A record whose references all resolved, ready to be written.
#[derive(Debug)]
pub struct Resolved<'a, R> {
    pub record: &'a R,
    references: Vec<(Collection, SurrogateId)>,
}

impl<'a, R> Resolved<'a, R> {
    pub fn new(record: &'a R, references: Vec<(Collection, SurrogateId)>) -> Self {
        Self { record, references }
    }

    /// Surrogate id of the parent in `target`, or `None` when the record
    /// leaves that optional reference unset.
    pub fn surrogate(&self, target: Collection) -> Option<SurrogateId> {
        self.references
            .iter()
            .find(|(collection, _)| *collection == target)
            .map(|(_, id)| *id)
    }

    pub fn references(&self) -> &[(Collection, SurrogateId)] {
        &self.references
    }
}

#[async_trait]
pub trait BulkUpsert<R: SyncRecord>: Send {
    /// Inserts or overwrites every row by natural key in one statement,
    /// stamping `last_synced_at`. Either all rows are written or none are.
    async fn upsert_by_local_id<'a>(
        &mut self,
        rows: &[Resolved<'a, R>],
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// One atomic unit of work spanning a whole sync batch.
#[async_trait]
pub trait SyncSession:
    NaturalKeyLookup
    + BulkUpsert<ServiceRecord>
    + BulkUpsert<MemberRecord>
    + BulkUpsert<AttendanceRecord>
    + BulkUpsert<TransactionRecord>
    + BulkUpsert<HealthMetricRecord>
    + BulkUpsert<StaffRecord>
    + BulkUpsert<StaffAttendanceRecord>
    + Send
{
    async fn commit(self) -> Result<(), StoreError>;
    async fn rollback(self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SyncStore: Send + Sync {
    type Session: SyncSession;

    async fn begin(&self) -> Result<Self::Session, StoreError>;

    /// Most recent `last_synced_at` in `collection`, `None` when it is empty.
    async fn max_last_synced_at(
        &self,
        collection: Collection,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;
}
