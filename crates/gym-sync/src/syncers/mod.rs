//! [`SyncRecord`](crate::syncer::SyncRecord) bindings for each collection.

mod attendance;
mod health_metrics;
mod members;
mod services;
mod staff;
mod staff_attendance;
mod transactions;
