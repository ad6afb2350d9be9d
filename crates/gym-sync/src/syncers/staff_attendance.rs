use crate::collection::{Collection, LocalId};
use crate::payload::StaffAttendanceRecord;
use crate::resolver::ForeignRef;
use crate::syncer::SyncRecord;

impl SyncRecord for StaffAttendanceRecord {
    const COLLECTION: Collection = Collection::StaffAttendance;

    fn local_id(&self) -> LocalId {
        self.local_id
    }

    fn foreign_refs(&self) -> Vec<ForeignRef> {
        vec![ForeignRef::required(Collection::Staff, self.staff_local_id)]
    }
}
