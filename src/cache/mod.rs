//! Local cache of remote content.
//!
//! - `engine`: single-item sync, paginated full sync with reconciliation, purge
//! - `reconcile`: which cached records a full sync deletes
//! - `storage`: SQLite-backed store
//! - `traits`: the store contract and its record types

mod engine;
mod reconcile;
mod storage;
mod traits;

pub use engine::{CacheSyncEngine, PurgeOutcome, SyncAllReport, SyncOutcome};
pub use reconcile::{stale_ids, Reconciliation};
pub use storage::SqliteStore;
pub use traits::{CachedRecord, ContentStore, Lookup, Upserted};
