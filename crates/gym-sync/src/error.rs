use std::fmt;
use thiserror::Error;

use crate::collection::{Collection, LocalId};

/// Failure reported by a store implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store refused a write because a referenced row does not exist.
    #[error("{0}")]
    MissingReference(String),
    #[error("{0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.kind() == sqlx::error::ErrorKind::ForeignKeyViolation {
                return StoreError::MissingReference(db_err.message().to_string());
            }
        }
        StoreError::Database(err.to_string())
    }
}

/// A per-collection failure recorded while reconciling a batch.
///
/// `MissingReference` and `RejectedReference` mean the payload is internally
/// inconsistent and abort the whole batch; `Write` only fails the collection
/// it was raised for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(
        "{} with localId {local_id} references missing {} with localId {target_local_id}",
        .collection.record_label(),
        .target.entity_label()
    )]
    MissingReference {
        collection: Collection,
        local_id: LocalId,
        target: Collection,
        target_local_id: LocalId,
    },
    #[error("Failed to sync {collection}: {message}")]
    RejectedReference {
        collection: Collection,
        message: String,
    },
    #[error("Failed to sync {collection}: {message}")]
    Write {
        collection: Collection,
        message: String,
    },
}

impl SyncError {
    pub fn from_store(collection: Collection, err: StoreError) -> Self {
        match err {
            StoreError::MissingReference(message) => SyncError::RejectedReference {
                collection,
                message,
            },
            StoreError::Database(message) => SyncError::Write {
                collection,
                message,
            },
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            SyncError::MissingReference { .. } | SyncError::RejectedReference { .. }
        )
    }

    pub fn collection(&self) -> Collection {
        match self {
            SyncError::MissingReference { collection, .. }
            | SyncError::RejectedReference { collection, .. }
            | SyncError::Write { collection, .. } => *collection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub collection: Collection,
    pub index: usize,
    pub field: &'static str,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}].{} must not be empty",
            self.collection.key(),
            self.index,
            self.field
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("malformed sync payload: {0}")]
    Malformed(String),
    #[error("invalid sync payload: {}", join_violations(.0))]
    Invalid(Vec<FieldViolation>),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reference_names_record_target_and_key() {
        let err = SyncError::MissingReference {
            collection: Collection::Members,
            local_id: 1,
            target: Collection::Services,
            target_local_id: 99,
        };
        assert_eq!(
            err.to_string(),
            "Member with localId 1 references missing service with localId 99"
        );
        assert!(err.is_critical());
    }

    #[test]
    fn store_errors_map_to_typed_sync_errors() {
        let rejected = SyncError::from_store(
            Collection::Attendance,
            StoreError::MissingReference("violates foreign key constraint".into()),
        );
        assert!(rejected.is_critical());

        let write = SyncError::from_store(
            Collection::HealthMetrics,
            StoreError::Database("value too long".into()),
        );
        assert!(!write.is_critical());
        assert_eq!(
            write.to_string(),
            "Failed to sync health metrics: value too long"
        );
    }

    #[test]
    fn write_error_mentioning_missing_is_still_non_critical() {
        let err = SyncError::Write {
            collection: Collection::Services,
            message: "column \"missing\" not found".into(),
        };
        assert!(!err.is_critical());
    }

    #[test]
    fn invalid_payload_lists_every_violation() {
        let err = PayloadError::Invalid(vec![
            FieldViolation {
                collection: Collection::Members,
                index: 0,
                field: "fullName",
            },
            FieldViolation {
                collection: Collection::HealthMetrics,
                index: 3,
                field: "bodyType",
            },
        ]);
        assert_eq!(
            err.to_string(),
            "invalid sync payload: members[0].fullName must not be empty; healthMetrics[3].bodyType must not be empty"
        );
    }
}
