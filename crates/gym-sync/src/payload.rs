//! Wire contract for a desktop sync push.
//!
//! Every `id` below is the desktop natural key of the record; `serviceId`,
//! `memberId` and `staffId` are natural keys of the parent collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::{Collection, LocalId};
use crate::datetime;
use crate::error::{FieldViolation, PayloadError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServiceRecord {
    #[serde(rename = "id")]
    pub local_id: LocalId,
    pub name: String,
    /// Subscription length in days.
    pub period: i32,
    pub price: f64,
    pub category: String,
    pub description: Option<String>,
    pub max_usage_count: Option<i32>,
    pub usage_type: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemberRecord {
    #[serde(rename = "id")]
    pub local_id: LocalId,
    pub full_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    #[serde(deserialize_with = "datetime::deserialize")]
    pub first_registered_at: DateTime<Utc>,
    pub profile_image_url: Option<String>,
    #[serde(deserialize_with = "datetime::deserialize")]
    pub subscription_start_date: DateTime<Utc>,
    #[serde(deserialize_with = "datetime::deserialize")]
    pub subscription_end_date: DateTime<Utc>,
    pub subscription_used_count: i32,
    pub subscription_status: String,
    pub frozen: i32,
    #[serde(default, deserialize_with = "datetime::deserialize_option")]
    pub frozen_start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "datetime::deserialize_option")]
    pub frozen_until_date: Option<DateTime<Utc>>,
    pub frozen_reason: Option<String>,
    pub freeze_duration_requested: Option<i32>,
    pub status: String,
    #[serde(rename = "serviceId")]
    pub service_local_id: Option<LocalId>,
    pub external_member_id: Option<String>,
    #[serde(default, deserialize_with = "datetime::deserialize_option")]
    pub date_of_birth: Option<DateTime<Utc>>,
    pub gender: Option<String>,
    pub organization_name: Option<String>,
    pub card_no: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttendanceRecord {
    #[serde(rename = "id")]
    pub local_id: LocalId,
    #[serde(rename = "memberId")]
    pub member_local_id: LocalId,
    #[serde(deserialize_with = "datetime::deserialize")]
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransactionRecord {
    #[serde(rename = "id")]
    pub local_id: LocalId,
    pub transaction_type: String,
    pub amount: f64,
    #[serde(deserialize_with = "datetime::deserialize")]
    pub transaction_date: DateTime<Utc>,
    pub description: String,
    #[serde(rename = "memberId")]
    pub member_local_id: Option<LocalId>,
    #[serde(rename = "serviceId")]
    pub service_local_id: Option<LocalId>,
    pub payment_method_id: Option<i64>,
    pub income_category_id: Option<i64>,
    pub payment_status: String,
    #[serde(default, deserialize_with = "datetime::deserialize_option")]
    pub subscription_period_start: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "datetime::deserialize_option")]
    pub subscription_period_end: Option<DateTime<Utc>>,
    pub expense_category_id: Option<i64>,
    pub vendor: Option<String>,
    pub receipt_url: Option<String>,
    pub notes: Option<String>,
    pub reference_transaction_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HealthMetricRecord {
    #[serde(rename = "id")]
    pub local_id: LocalId,
    #[serde(rename = "memberId")]
    pub member_local_id: LocalId,
    #[serde(deserialize_with = "datetime::deserialize")]
    pub measured_at: DateTime<Utc>,
    pub weight: Option<f64>,
    pub bmi: Option<f64>,
    pub body_fat_percent: Option<f64>,
    pub heart_rate: Option<i32>,
    pub muscle_mass: Option<f64>,
    pub lean_body_mass: Option<f64>,
    pub bone_mass: Option<f64>,
    pub skeletal_muscle_mass: Option<f64>,
    pub visceral_fat: Option<i32>,
    pub subcutaneous_fat_percent: Option<f64>,
    pub protein_percent: Option<f64>,
    pub bmr: Option<i32>,
    pub body_age: Option<i32>,
    pub body_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StaffRecord {
    #[serde(rename = "id")]
    pub local_id: LocalId,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StaffAttendanceRecord {
    #[serde(rename = "id")]
    pub local_id: LocalId,
    #[serde(rename = "staffId")]
    pub staff_local_id: LocalId,
    #[serde(deserialize_with = "datetime::deserialize")]
    pub scanned_at: DateTime<Utc>,
}

/// One push from a desktop client. Absent collections deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncPayload {
    #[serde(
        default,
        deserialize_with = "datetime::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub services: Vec<ServiceRecord>,
    #[serde(default)]
    pub members: Vec<MemberRecord>,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
    #[serde(default)]
    pub health_metrics: Vec<HealthMetricRecord>,
    #[serde(default)]
    pub staff: Vec<StaffRecord>,
    #[serde(default)]
    pub staff_attendance: Vec<StaffAttendanceRecord>,
}

impl SyncPayload {
    /// Parses and validates a JSON payload.
    pub fn from_json(raw: &str) -> Result<Self, PayloadError> {
        let payload: SyncPayload =
            serde_json::from_str(raw).map_err(|err| PayloadError::Malformed(err.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        let mut violations = Vec::new();
        check_required(&mut violations, Collection::Services, &self.services, |s| {
            vec![
                ("name", s.name.as_str()),
                ("category", s.category.as_str()),
                ("usageType", s.usage_type.as_str()),
                ("status", s.status.as_str()),
            ]
        });
        check_required(&mut violations, Collection::Members, &self.members, |m| {
            vec![
                ("fullName", m.full_name.as_str()),
                ("phoneNumber", m.phone_number.as_str()),
                ("subscriptionStatus", m.subscription_status.as_str()),
                ("status", m.status.as_str()),
            ]
        });
        check_required(
            &mut violations,
            Collection::Transactions,
            &self.transactions,
            |t| {
                vec![
                    ("transactionType", t.transaction_type.as_str()),
                    ("description", t.description.as_str()),
                    ("paymentStatus", t.payment_status.as_str()),
                ]
            },
        );
        check_required(&mut violations, Collection::Staff, &self.staff, |s| {
            vec![("fullName", s.full_name.as_str())]
        });

        if violations.is_empty() {
            Ok(())
        } else {
            Err(PayloadError::Invalid(violations))
        }
    }

    pub fn record_count(&self) -> usize {
        self.services.len()
            + self.members.len()
            + self.attendance.len()
            + self.transactions.len()
            + self.health_metrics.len()
            + self.staff.len()
            + self.staff_attendance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}

fn check_required<'a, R>(
    violations: &mut Vec<FieldViolation>,
    collection: Collection,
    records: &'a [R],
    fields: impl Fn(&'a R) -> Vec<(&'static str, &'a str)>,
) {
    for (index, record) in records.iter().enumerate() {
        for (field, value) in fields(record) {
            if value.is_empty() {
                violations.push(FieldViolation {
                    collection,
                    index,
                    field,
                });
            }
        }
    }
}
