//! Postgres implementation of the sync store.
//!
//! A batch runs in one transaction. Every lookup and bulk write runs inside
//! its own savepoint so that a failed statement leaves the outer transaction
//! usable for the remaining collections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::query_builder::Separated;
use sqlx::{Connection, Pool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

use crate::collection::{Collection, KeyMap, LocalId};
use crate::error::StoreError;
use crate::payload::{
    AttendanceRecord, HealthMetricRecord, MemberRecord, ServiceRecord, StaffAttendanceRecord,
    StaffRecord, TransactionRecord,
};
use crate::resolver::NaturalKeyLookup;
use crate::store::{BulkUpsert, Resolved, SyncSession, SyncStore};

/// Postgres caps a statement at 65535 bind parameters.
const BIND_LIMIT: usize = 65_535;

type RowBuilder<'qb> = Separated<'qb, 'static, Postgres, &'static str>;

#[derive(Clone)]
pub struct PgSyncStore {
    pool: Pool<Postgres>,
}

impl PgSyncStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

pub struct PgSyncSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SyncStore for PgSyncStore {
    type Session = PgSyncSession;

    async fn begin(&self) -> Result<PgSyncSession, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgSyncSession { tx })
    }

    async fn max_last_synced_at(
        &self,
        collection: Collection,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let sql = format!("SELECT MAX(last_synced_at) FROM {}", collection.table());
        let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(latest)
    }
}

#[async_trait]
impl SyncSession for PgSyncSession {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl NaturalKeyLookup for PgSyncSession {
    async fn find_by_local_ids(
        &mut self,
        collection: Collection,
        local_ids: &[LocalId],
    ) -> Result<KeyMap, StoreError> {
        if local_ids.is_empty() {
            return Ok(KeyMap::new());
        }
        let sql = format!(
            "SELECT local_id, id FROM {} WHERE local_id = ANY($1)",
            collection.table()
        );

        let mut savepoint = Connection::begin(&mut *self.tx).await?;
        let rows = sqlx::query_as::<_, (i64, i64)>(&sql)
            .bind(local_ids)
            .fetch_all(&mut *savepoint)
            .await;
        match rows {
            Ok(rows) => {
                savepoint.commit().await?;
                Ok(rows.into_iter().collect())
            }
            Err(err) => {
                savepoint.rollback().await?;
                Err(err.into())
            }
        }
    }
}

impl PgSyncSession {
    /// `INSERT .. ON CONFLICT (local_id) DO UPDATE` over `rows`, split into
    /// as many statements as the bind limit requires. All statements share
    /// one savepoint, so the write is all or nothing.
    async fn upsert_chunked<'r, R, F>(
        &mut self,
        collection: Collection,
        columns: &[&str],
        rows: &[Resolved<'r, R>],
        mut push_row: F,
    ) -> Result<(), StoreError>
    where
        R: Sync,
        F: FnMut(&mut RowBuilder<'_>, &Resolved<'r, R>) + Send,
    {
        let insert = format!(
            "INSERT INTO {} ({}) ",
            collection.table(),
            columns.join(", ")
        );
        let updates = columns
            .iter()
            .filter(|column| **column != "local_id")
            .map(|column| format!("{column} = EXCLUDED.{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        let chunk_size = (BIND_LIMIT / columns.len()).max(1);

        let mut savepoint = Connection::begin(&mut *self.tx).await?;
        for chunk in rows.chunks(chunk_size) {
            let mut builder = QueryBuilder::<Postgres>::new(insert.as_str());
            builder.push_values(chunk, |mut row_builder, row| push_row(&mut row_builder, row));
            builder.push(format!(
                " ON CONFLICT (local_id) DO UPDATE SET {updates}, updated_at = NOW()"
            ));
            if let Err(err) = builder.build().execute(&mut *savepoint).await {
                savepoint.rollback().await?;
                return Err(err.into());
            }
        }
        savepoint.commit().await?;
        debug!(collection = collection.key(), rows = rows.len(), "bulk upsert written");
        Ok(())
    }
}

const SERVICE_COLUMNS: &[&str] = &[
    "local_id",
    "name",
    "period",
    "price",
    "category",
    "description",
    "max_usage_count",
    "usage_type",
    "status",
    "last_synced_at",
];

#[async_trait]
impl BulkUpsert<ServiceRecord> for PgSyncSession {
    async fn upsert_by_local_id<'a>(
        &mut self,
        rows: &[Resolved<'a, ServiceRecord>],
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.upsert_chunked(Collection::Services, SERVICE_COLUMNS, rows, move |b, row| {
            let service = row.record;
            b.push_bind(service.local_id)
                .push_bind(service.name.clone())
                .push_bind(service.period)
                .push_bind(service.price)
                .push_unseparated("::NUMERIC")
                .push_bind(service.category.clone())
                .push_bind(service.description.clone())
                .push_bind(service.max_usage_count)
                .push_bind(service.usage_type.clone())
                .push_bind(service.status.clone())
                .push_bind(synced_at);
        })
        .await
    }
}

const MEMBER_COLUMNS: &[&str] = &[
    "local_id",
    "full_name",
    "phone_number",
    "email",
    "first_registered_at",
    "profile_image_url",
    "subscription_start_date",
    "subscription_end_date",
    "subscription_used_count",
    "subscription_status",
    "frozen",
    "frozen_start_date",
    "frozen_until_date",
    "frozen_reason",
    "freeze_duration_requested",
    "status",
    "service_local_id",
    "service_id",
    "external_member_id",
    "date_of_birth",
    "gender",
    "organization_name",
    "card_no",
    "last_synced_at",
];

#[async_trait]
impl BulkUpsert<MemberRecord> for PgSyncSession {
    async fn upsert_by_local_id<'a>(
        &mut self,
        rows: &[Resolved<'a, MemberRecord>],
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.upsert_chunked(Collection::Members, MEMBER_COLUMNS, rows, move |b, row| {
            let member = row.record;
            b.push_bind(member.local_id)
                .push_bind(member.full_name.clone())
                .push_bind(member.phone_number.clone())
                .push_bind(member.email.clone())
                .push_bind(member.first_registered_at)
                .push_bind(member.profile_image_url.clone())
                .push_bind(member.subscription_start_date)
                .push_bind(member.subscription_end_date)
                .push_bind(member.subscription_used_count)
                .push_bind(member.subscription_status.clone())
                .push_bind(member.frozen)
                .push_bind(member.frozen_start_date)
                .push_bind(member.frozen_until_date)
                .push_bind(member.frozen_reason.clone())
                .push_bind(member.freeze_duration_requested)
                .push_bind(member.status.clone())
                .push_bind(member.service_local_id)
                .push_bind(row.surrogate(Collection::Services))
                .push_bind(member.external_member_id.clone())
                .push_bind(member.date_of_birth)
                .push_bind(member.gender.clone())
                .push_bind(member.organization_name.clone())
                .push_bind(member.card_no.clone())
                .push_bind(synced_at);
        })
        .await
    }
}

const ATTENDANCE_COLUMNS: &[&str] = &[
    "local_id",
    "member_local_id",
    "member_id",
    "date",
    "last_synced_at",
];

#[async_trait]
impl BulkUpsert<AttendanceRecord> for PgSyncSession {
    async fn upsert_by_local_id<'a>(
        &mut self,
        rows: &[Resolved<'a, AttendanceRecord>],
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.upsert_chunked(Collection::Attendance, ATTENDANCE_COLUMNS, rows, move |b, row| {
            let attendance = row.record;
            b.push_bind(attendance.local_id)
                .push_bind(attendance.member_local_id)
                .push_bind(row.surrogate(Collection::Members))
                .push_bind(attendance.date)
                .push_bind(synced_at);
        })
        .await
    }
}

const TRANSACTION_COLUMNS: &[&str] = &[
    "local_id",
    "transaction_type",
    "amount",
    "transaction_date",
    "description",
    "member_local_id",
    "member_id",
    "service_local_id",
    "service_id",
    "payment_method_id",
    "income_category_id",
    "payment_status",
    "subscription_period_start",
    "subscription_period_end",
    "expense_category_id",
    "vendor",
    "receipt_url",
    "notes",
    "reference_transaction_id",
    "last_synced_at",
];

#[async_trait]
impl BulkUpsert<TransactionRecord> for PgSyncSession {
    async fn upsert_by_local_id<'a>(
        &mut self,
        rows: &[Resolved<'a, TransactionRecord>],
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.upsert_chunked(Collection::Transactions, TRANSACTION_COLUMNS, rows, move |b, row| {
            let transaction = row.record;
            b.push_bind(transaction.local_id)
                .push_bind(transaction.transaction_type.clone())
                .push_bind(transaction.amount)
                .push_unseparated("::NUMERIC")
                .push_bind(transaction.transaction_date)
                .push_bind(transaction.description.clone())
                .push_bind(transaction.member_local_id)
                .push_bind(row.surrogate(Collection::Members))
                .push_bind(transaction.service_local_id)
                .push_bind(row.surrogate(Collection::Services))
                .push_bind(transaction.payment_method_id)
                .push_bind(transaction.income_category_id)
                .push_bind(transaction.payment_status.clone())
                .push_bind(transaction.subscription_period_start)
                .push_bind(transaction.subscription_period_end)
                .push_bind(transaction.expense_category_id)
                .push_bind(transaction.vendor.clone())
                .push_bind(transaction.receipt_url.clone())
                .push_bind(transaction.notes.clone())
                .push_bind(transaction.reference_transaction_id)
                .push_bind(synced_at);
        })
        .await
    }
}

const HEALTH_METRIC_COLUMNS: &[&str] = &[
    "local_id",
    "member_local_id",
    "member_id",
    "measured_at",
    "weight",
    "bmi",
    "body_fat_percent",
    "heart_rate",
    "muscle_mass",
    "lean_body_mass",
    "bone_mass",
    "skeletal_muscle_mass",
    "visceral_fat",
    "subcutaneous_fat_percent",
    "protein_percent",
    "bmr",
    "body_age",
    "body_type",
    "last_synced_at",
];

#[async_trait]
impl BulkUpsert<HealthMetricRecord> for PgSyncSession {
    async fn upsert_by_local_id<'a>(
        &mut self,
        rows: &[Resolved<'a, HealthMetricRecord>],
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.upsert_chunked(
            Collection::HealthMetrics,
            HEALTH_METRIC_COLUMNS,
            rows,
            move |b, row| {
                let metric = row.record;
                b.push_bind(metric.local_id)
                    .push_bind(metric.member_local_id)
                    .push_bind(row.surrogate(Collection::Members))
                    .push_bind(metric.measured_at)
                    .push_bind(metric.weight)
                    .push_bind(metric.bmi)
                    .push_bind(metric.body_fat_percent)
                    .push_bind(metric.heart_rate)
                    .push_bind(metric.muscle_mass)
                    .push_bind(metric.lean_body_mass)
                    .push_bind(metric.bone_mass)
                    .push_bind(metric.skeletal_muscle_mass)
                    .push_bind(metric.visceral_fat)
                    .push_bind(metric.subcutaneous_fat_percent)
                    .push_bind(metric.protein_percent)
                    .push_bind(metric.bmr)
                    .push_bind(metric.body_age)
                    .push_bind(metric.body_type.clone())
                    .push_bind(synced_at);
            },
        )
        .await
    }
}

const STAFF_COLUMNS: &[&str] = &[
    "local_id",
    "full_name",
    "phone_number",
    "role",
    "last_synced_at",
];

#[async_trait]
impl BulkUpsert<StaffRecord> for PgSyncSession {
    async fn upsert_by_local_id<'a>(
        &mut self,
        rows: &[Resolved<'a, StaffRecord>],
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.upsert_chunked(Collection::Staff, STAFF_COLUMNS, rows, move |b, row| {
            let staff = row.record;
            b.push_bind(staff.local_id)
                .push_bind(staff.full_name.clone())
                .push_bind(staff.phone_number.clone())
                .push_bind(staff.role.clone())
                .push_bind(synced_at);
        })
        .await
    }
}

const STAFF_ATTENDANCE_COLUMNS: &[&str] = &[
    "local_id",
    "staff_local_id",
    "staff_id",
    "scanned_at",
    "last_synced_at",
];

#[async_trait]
impl BulkUpsert<StaffAttendanceRecord> for PgSyncSession {
    async fn upsert_by_local_id<'a>(
        &mut self,
        rows: &[Resolved<'a, StaffAttendanceRecord>],
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.upsert_chunked(
            Collection::StaffAttendance,
            STAFF_ATTENDANCE_COLUMNS,
            rows,
            move |b, row| {
                let scan = row.record;
                b.push_bind(scan.local_id)
                    .push_bind(scan.staff_local_id)
                    .push_bind(row.surrogate(Collection::Staff))
                    .push_bind(scan.scanned_at)
                    .push_bind(synced_at);
            },
        )
        .await
    }
}
