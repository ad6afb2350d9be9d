use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Natural key assigned by the desktop client, unique within one collection.
pub type LocalId = i64;

/// Cloud-assigned primary key.
pub type SurrogateId = i64;

/// `local_id -> id` for the natural keys found in one collection.
pub type KeyMap = HashMap<LocalId, SurrogateId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Services,
    Members,
    Attendance,
    Transactions,
    HealthMetrics,
    Staff,
    StaffAttendance,
}

impl Collection {
    /// Every collection, in the order a batch is reconciled.
    pub const ALL: [Collection; 7] = [
        Collection::Services,
        Collection::Members,
        Collection::Attendance,
        Collection::Transactions,
        Collection::HealthMetrics,
        Collection::Staff,
        Collection::StaffAttendance,
    ];

    /// Key of this collection in the sync payload and result JSON.
    pub fn key(self) -> &'static str {
        match self {
            Collection::Services => "services",
            Collection::Members => "members",
            Collection::Attendance => "attendance",
            Collection::Transactions => "transactions",
            Collection::HealthMetrics => "healthMetrics",
            Collection::Staff => "staff",
            Collection::StaffAttendance => "staffAttendance",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Collection::Services => "gym.services",
            Collection::Members => "gym.members",
            Collection::Attendance => "gym.attendance",
            Collection::Transactions => "gym.transactions",
            Collection::HealthMetrics => "gym.health_metrics",
            Collection::Staff => "gym.staff",
            Collection::StaffAttendance => "gym.staff_attendance",
        }
    }

    /// Plural name used in bulk-write error messages ("Failed to sync health metrics").
    pub fn label(self) -> &'static str {
        match self {
            Collection::Services => "services",
            Collection::Members => "members",
            Collection::Attendance => "attendance",
            Collection::Transactions => "transactions",
            Collection::HealthMetrics => "health metrics",
            Collection::Staff => "staff",
            Collection::StaffAttendance => "staff attendance",
        }
    }

    /// Singular name used when this collection is the target of a reference.
    pub fn entity_label(self) -> &'static str {
        match self {
            Collection::Services => "service",
            Collection::Members => "member",
            Collection::Attendance => "attendance record",
            Collection::Transactions => "transaction",
            Collection::HealthMetrics => "health metric record",
            Collection::Staff => "staff",
            Collection::StaffAttendance => "staff attendance record",
        }
    }

    /// Capitalised name used when a record of this collection is the subject of an error.
    pub fn record_label(self) -> &'static str {
        match self {
            Collection::Services => "Service",
            Collection::Members => "Member",
            Collection::Attendance => "Attendance record",
            Collection::Transactions => "Transaction",
            Collection::HealthMetrics => "Health metric record",
            Collection::Staff => "Staff",
            Collection::StaffAttendance => "Staff attendance record",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
