use crate::collection::{Collection, LocalId};
use crate::payload::TransactionRecord;
use crate::resolver::ForeignRef;
use crate::syncer::SyncRecord;

impl SyncRecord for TransactionRecord {
    const COLLECTION: Collection = Collection::Transactions;

    fn local_id(&self) -> LocalId {
        self.local_id
    }

    fn foreign_refs(&self) -> Vec<ForeignRef> {
        [
            ForeignRef::optional(Collection::Members, self.member_local_id),
            ForeignRef::optional(Collection::Services, self.service_local_id),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
