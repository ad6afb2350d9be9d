use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::{Collection, LocalId};
use crate::error::SyncError;
use crate::syncer::CollectionOutcome;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionResults {
    pub successful: Vec<LocalId>,
    pub failed: Vec<LocalId>,
}

/// Per-record outcome, keyed like the payload. Only collections that were
/// present in the payload appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<CollectionResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<CollectionResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance: Option<CollectionResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions: Option<CollectionResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_metrics: Option<CollectionResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff: Option<CollectionResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_attendance: Option<CollectionResults>,
}

impl DetailedResults {
    pub fn get(&self, collection: Collection) -> Option<&CollectionResults> {
        match collection {
            Collection::Services => self.services.as_ref(),
            Collection::Members => self.members.as_ref(),
            Collection::Attendance => self.attendance.as_ref(),
            Collection::Transactions => self.transactions.as_ref(),
            Collection::HealthMetrics => self.health_metrics.as_ref(),
            Collection::Staff => self.staff.as_ref(),
            Collection::StaffAttendance => self.staff_attendance.as_ref(),
        }
    }

    fn slot(&mut self, collection: Collection) -> &mut Option<CollectionResults> {
        match collection {
            Collection::Services => &mut self.services,
            Collection::Members => &mut self.members,
            Collection::Attendance => &mut self.attendance,
            Collection::Transactions => &mut self.transactions,
            Collection::HealthMetrics => &mut self.health_metrics,
            Collection::Staff => &mut self.staff,
            Collection::StaffAttendance => &mut self.staff_attendance,
        }
    }
}

/// Response to a sync push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub services_synced: usize,
    pub members_synced: usize,
    pub attendance_synced: usize,
    pub transactions_synced: usize,
    pub health_metrics_synced: usize,
    pub staff_synced: usize,
    pub staff_attendance_synced: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    /// Server time the result was produced.
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<DetailedResults>,
}

impl SyncResult {
    fn unsynced(errors: Vec<String>) -> Self {
        Self {
            success: errors.is_empty(),
            services_synced: 0,
            members_synced: 0,
            attendance_synced: 0,
            transactions_synced: 0,
            health_metrics_synced: 0,
            staff_synced: 0,
            staff_attendance_synced: 0,
            errors: (!errors.is_empty()).then_some(errors),
            timestamp: Utc::now(),
            results: None,
        }
    }

    /// Result for a batch that failed before any collection could be
    /// reconciled, or whose transaction could not be finalized.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::unsynced(vec![message.into()])
    }

    pub fn synced(&self, collection: Collection) -> usize {
        match collection {
            Collection::Services => self.services_synced,
            Collection::Members => self.members_synced,
            Collection::Attendance => self.attendance_synced,
            Collection::Transactions => self.transactions_synced,
            Collection::HealthMetrics => self.health_metrics_synced,
            Collection::Staff => self.staff_synced,
            Collection::StaffAttendance => self.staff_attendance_synced,
        }
    }

    fn synced_mut(&mut self, collection: Collection) -> &mut usize {
        match collection {
            Collection::Services => &mut self.services_synced,
            Collection::Members => &mut self.members_synced,
            Collection::Attendance => &mut self.attendance_synced,
            Collection::Transactions => &mut self.transactions_synced,
            Collection::HealthMetrics => &mut self.health_metrics_synced,
            Collection::Staff => &mut self.staff_synced,
            Collection::StaffAttendance => &mut self.staff_attendance_synced,
        }
    }

    pub fn error_messages(&self) -> &[String] {
        self.errors.as_deref().unwrap_or_default()
    }
}

/// Accumulates collection outcomes over one sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    outcomes: Vec<CollectionOutcome>,
}

impl SyncReport {
    pub fn push(&mut self, outcome: CollectionOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[CollectionOutcome] {
        &self.outcomes
    }

    pub fn errors(&self) -> impl Iterator<Item = &SyncError> {
        self.outcomes.iter().flat_map(|outcome| outcome.errors.iter())
    }

    pub fn has_critical_errors(&self) -> bool {
        self.outcomes.iter().any(CollectionOutcome::has_critical_errors)
    }

    fn error_messages(&self) -> Vec<String> {
        self.errors().map(ToString::to_string).collect()
    }

    /// Result for a batch whose transaction was rolled back: nothing was
    /// persisted, so every count is zero and no per-record results are given.
    pub fn into_rolled_back(self) -> SyncResult {
        let mut result = SyncResult::unsynced(self.error_messages());
        result.success = false;
        result
    }

    /// Result for a committed batch.
    pub fn into_committed(self) -> SyncResult {
        let mut result = SyncResult::unsynced(self.error_messages());
        if self.outcomes.is_empty() {
            return result;
        }

        let mut details = DetailedResults::default();
        for outcome in self.outcomes {
            *result.synced_mut(outcome.collection) = outcome.synced;
            *details.slot(outcome.collection) = Some(CollectionResults {
                successful: outcome.successful,
                failed: outcome.failed,
            });
        }
        result.results = Some(details);
        result
    }
}

/// Most recent time any record was synced, across all collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSyncTime {
    pub last_sync_at: Option<DateTime<Utc>>,
}
