use crate::collection::{Collection, LocalId};
use crate::payload::StaffRecord;
use crate::syncer::SyncRecord;

impl SyncRecord for StaffRecord {
    const COLLECTION: Collection = Collection::Staff;

    fn local_id(&self) -> LocalId {
        self.local_id
    }
}

#[cfg(test)]
mod tests {
    use crate::collection::Collection;
    use crate::memory::MemoryStore;
    use crate::payload::StaffRecord;
    use crate::store::{SyncSession, SyncStore};
    use crate::syncer::sync_collection;
    use crate::syncers::fixtures::{at, member, staff};

    #[tokio::test]
    async fn staff_keys_are_independent_of_members() {
        let store = MemoryStore::new();
        let mut session = store.begin().await.unwrap();

        sync_collection(&mut session, &[member(5, None)], at(5)).await;
        let outcome = sync_collection(&mut session, &[staff(5)], at(5)).await;
        session.commit().await.unwrap();

        assert_eq!(outcome.successful, vec![5]);
        let staff_row = store.row(Collection::Staff, 5).unwrap();
        let member_row = store.row(Collection::Members, 5).unwrap();
        assert_ne!(staff_row.id, member_row.id);
        assert_eq!(staff_row.data["role"], "trainer");
    }

    #[tokio::test]
    async fn nothing_is_written_for_an_empty_batch() {
        let store = MemoryStore::new();
        let mut session = store.begin().await.unwrap();

        let outcome = sync_collection::<StaffRecord, _>(&mut session, &[], at(5)).await;
        session.commit().await.unwrap();

        assert_eq!(outcome.synced, 0);
        assert!(outcome.errors.is_empty());
        assert!(store.rows(Collection::Staff).is_empty());
    }
}
