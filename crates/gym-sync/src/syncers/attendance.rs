use crate::collection::{Collection, LocalId};
use crate::payload::AttendanceRecord;
use crate::resolver::ForeignRef;
use crate::syncer::SyncRecord;

impl SyncRecord for AttendanceRecord {
    const COLLECTION: Collection = Collection::Attendance;

    fn local_id(&self) -> LocalId {
        self.local_id
    }

    fn foreign_refs(&self) -> Vec<ForeignRef> {
        vec![ForeignRef::required(Collection::Members, self.member_local_id)]
    }
}
