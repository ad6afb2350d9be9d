use crate::collection::{Collection, LocalId};
use crate::payload::HealthMetricRecord;
use crate::resolver::ForeignRef;
use crate::syncer::SyncRecord;

impl SyncRecord for HealthMetricRecord {
    const COLLECTION: Collection = Collection::HealthMetrics;

    fn local_id(&self) -> LocalId {
        self.local_id
    }

    fn foreign_refs(&self) -> Vec<ForeignRef> {
        vec![ForeignRef::required(Collection::Members, self.member_local_id)]
    }
}
