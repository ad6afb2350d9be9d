use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::collection::Collection;
use crate::error::StoreError;
use crate::payload::SyncPayload;
use crate::resolver::NaturalKeyLookup;
use crate::result::{LastSyncTime, SyncReport, SyncResult};
use crate::store::{BulkUpsert, SyncSession, SyncStore};
use crate::syncer::{sync_collection, SyncRecord};

/// Runs whole sync batches against a [`SyncStore`].
#[derive(Debug, Clone)]
pub struct SyncOrchestrator<S> {
    store: S,
}

impl<S: SyncStore> SyncOrchestrator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reconciles every collection of `payload` inside one transaction.
    ///
    /// A missing or rejected reference rolls the whole batch back. Other
    /// write failures only fail their collection and the rest is committed.
    pub async fn sync(&self, payload: &SyncPayload) -> SyncResult {
        let span = info_span!(
            "sync",
            sync_id = %Uuid::new_v4(),
            client_timestamp = ?payload.timestamp,
            records = payload.record_count(),
        );
        async move {
            match self.reconcile(payload).await {
                Ok(result) => result,
                Err(err) => {
                    error!(error = %err, "sync aborted");
                    SyncResult::aborted(err.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn reconcile(&self, payload: &SyncPayload) -> Result<SyncResult, StoreError> {
        info!("sync started");
        let mut session = self.store.begin().await?;
        let synced_at = Utc::now();
        let mut report = SyncReport::default();

        // Parents before children so references resolve within the batch.
        step(&mut session, &payload.services, synced_at, &mut report).await;
        step(&mut session, &payload.members, synced_at, &mut report).await;
        step(&mut session, &payload.attendance, synced_at, &mut report).await;
        step(&mut session, &payload.transactions, synced_at, &mut report).await;
        step(&mut session, &payload.health_metrics, synced_at, &mut report).await;
        step(&mut session, &payload.staff, synced_at, &mut report).await;
        step(&mut session, &payload.staff_attendance, synced_at, &mut report).await;

        if report.has_critical_errors() {
            session.rollback().await?;
            warn!(
                errors = report.errors().count(),
                "sync rolled back because of unresolved references"
            );
            return Ok(report.into_rolled_back());
        }

        session.commit().await?;
        let result = report.into_committed();
        info!(
            success = result.success,
            services = result.services_synced,
            members = result.members_synced,
            attendance = result.attendance_synced,
            transactions = result.transactions_synced,
            health_metrics = result.health_metrics_synced,
            staff = result.staff_synced,
            staff_attendance = result.staff_attendance_synced,
            "sync committed"
        );
        Ok(result)
    }

    /// Latest `last_synced_at` over every collection. A collection that
    /// cannot be queried is skipped.
    pub async fn last_sync_time(&self) -> LastSyncTime {
        let lookups = Collection::ALL.into_iter().map(|collection| async move {
            (collection, self.store.max_last_synced_at(collection).await)
        });

        let mut latest: Option<DateTime<Utc>> = None;
        for (collection, result) in join_all(lookups).await {
            match result {
                Ok(found) => latest = latest.max(found),
                Err(err) => warn!(
                    collection = collection.key(),
                    error = %err,
                    "failed to read last sync time"
                ),
            }
        }
        LastSyncTime {
            last_sync_at: latest,
        }
    }
}

async fn step<R, T>(
    session: &mut T,
    records: &[R],
    synced_at: DateTime<Utc>,
    report: &mut SyncReport,
) where
    R: SyncRecord,
    T: NaturalKeyLookup + BulkUpsert<R>,
{
    if records.is_empty() {
        return;
    }
    let outcome = sync_collection(session, records, synced_at).await;
    info!(
        collection = R::COLLECTION.key(),
        synced = outcome.synced,
        failed = outcome.failed.len(),
        "collection reconciled"
    );
    report.push(outcome);
}
