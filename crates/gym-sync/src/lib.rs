//! Reconciles record batches pushed by offline desktop clients into the
//! cloud store.
//!
//! Records are identified by the natural key the desktop assigned them
//! (`local_id`). Each push is applied in one transaction: collections are
//! upserted parents first, references are resolved from natural keys to
//! cloud surrogate ids, and any unresolvable reference rolls the batch back.

pub mod collection;
pub mod datetime;
pub mod error;
pub mod orchestrator;
pub mod payload;
pub mod postgres;
pub mod resolver;
pub mod result;
pub mod store;
pub mod syncer;
mod syncers;

#[cfg(test)]
mod memory;

pub use collection::{Collection, LocalId, SurrogateId};
pub use error::{PayloadError, StoreError, SyncError};
pub use orchestrator::SyncOrchestrator;
pub use payload::SyncPayload;
pub use postgres::PgSyncStore;
pub use result::{CollectionResults, DetailedResults, LastSyncTime, SyncResult};
