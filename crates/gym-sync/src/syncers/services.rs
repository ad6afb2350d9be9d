use crate::collection::{Collection, LocalId};
use crate::payload::ServiceRecord;
use crate::syncer::SyncRecord;

impl SyncRecord for ServiceRecord {
    const COLLECTION: Collection = Collection::Services;

    fn local_id(&self) -> LocalId {
        self.local_id
    }
}

#[cfg(test)]
mod tests {
    use crate::collection::Collection;
    use crate::error::{StoreError, SyncError};
    use crate::memory::MemoryStore;
    use crate::store::{SyncSession, SyncStore};
    use crate::syncer::sync_collection;
    use crate::syncers::fixtures::{at, service};

    #[tokio::test]
    async fn upserts_without_lookups() {
        let store = MemoryStore::new();
        let mut session = store.begin().await.unwrap();

        let outcome = sync_collection(&mut session, &[service(1), service(2)], at(5)).await;
        session.commit().await.unwrap();

        assert_eq!(outcome.synced, 2);
        assert_eq!(outcome.successful, vec![1, 2]);
        assert!(outcome.errors.is_empty());
        assert!(store.lookups().is_empty());
        let stored = store.row(Collection::Services, 2).unwrap();
        assert_eq!(stored.data["name"], "Service 2");
        assert_eq!(stored.last_synced_at, at(5));
    }

    #[tokio::test]
    async fn overwrites_existing_row_by_local_id() {
        let store = MemoryStore::new();
        let existing = store.seed(Collection::Services, 1, at(1));
        let mut session = store.begin().await.unwrap();

        let mut renamed = service(1);
        renamed.name = "Pool".into();
        let outcome = sync_collection(&mut session, &[renamed], at(6)).await;
        session.commit().await.unwrap();

        assert_eq!(outcome.synced, 1);
        let stored = store.row(Collection::Services, 1).unwrap();
        assert_eq!(stored.id, existing);
        assert_eq!(stored.data["name"], "Pool");
        assert_eq!(stored.writes, 2);
        assert_eq!(store.rows(Collection::Services).len(), 1);
    }

    #[tokio::test]
    async fn duplicate_local_ids_collapse_to_last_occurrence() {
        let store = MemoryStore::new();
        let mut session = store.begin().await.unwrap();

        let mut second = service(1);
        second.price = 750.0;
        let outcome =
            sync_collection(&mut session, &[service(1), service(2), second], at(5)).await;
        session.commit().await.unwrap();

        assert_eq!(outcome.synced, 2);
        assert_eq!(outcome.successful, vec![1, 2]);
        assert_eq!(store.row(Collection::Services, 1).unwrap().data["price"], 750.0);
    }

    #[tokio::test]
    async fn write_failure_fails_every_record() {
        let store = MemoryStore::new();
        store.fail_upserts(
            Collection::Services,
            StoreError::Database("deadlock detected".into()),
        );
        let mut session = store.begin().await.unwrap();

        let outcome = sync_collection(&mut session, &[service(1), service(2)], at(5)).await;

        assert_eq!(outcome.synced, 0);
        assert!(outcome.successful.is_empty());
        assert_eq!(outcome.failed, vec![1, 2]);
        assert_eq!(
            outcome.errors,
            vec![SyncError::Write {
                collection: Collection::Services,
                message: "deadlock detected".into(),
            }]
        );
        assert!(!outcome.has_critical_errors());
    }
}
