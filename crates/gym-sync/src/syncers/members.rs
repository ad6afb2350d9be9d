use crate::collection::{Collection, LocalId};
use crate::payload::MemberRecord;
use crate::resolver::ForeignRef;
use crate::syncer::SyncRecord;

impl SyncRecord for MemberRecord {
    const COLLECTION: Collection = Collection::Members;

    fn local_id(&self) -> LocalId {
        self.local_id
    }

    fn foreign_refs(&self) -> Vec<ForeignRef> {
        ForeignRef::optional(Collection::Services, self.service_local_id)
            .into_iter()
            .collect()
    }
}
