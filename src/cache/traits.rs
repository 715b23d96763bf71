//! Storage contract for cached content records.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::collections::BTreeSet;

use crate::wp::{RecordFields, RemoteId};

use super::reconcile::stale_ids;

/// Durable local copy of one remote item.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRecord {
  pub content_type: String,
  pub remote_id: RemoteId,
  pub fields: RecordFields,
  /// When the record was last written by a successful sync
  pub synced_at: DateTime<Utc>,
}

/// Result of a strict lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
  Found(CachedRecord),
  NotFound,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
  Created,
  Updated,
}

/// Keyed storage of cached records, partitioned by content type.
///
/// Implementations must make `upsert` atomic per (content type, id): it is
/// the only protection against two workers syncing the same item.
pub trait ContentStore: Send + Sync {
  /// Look up one record.
  fn find(&self, content_type: &str, remote_id: &RemoteId) -> Result<Lookup>;

  /// Find-or-create the record and replace its fields.
  fn upsert(
    &self,
    content_type: &str,
    remote_id: &RemoteId,
    fields: &RecordFields,
  ) -> Result<Upserted>;

  /// Delete one record. Returns whether it existed.
  fn delete(&self, content_type: &str, remote_id: &RemoteId) -> Result<bool>;

  /// Ids of every cached record of a content type.
  fn remote_ids(&self, content_type: &str) -> Result<BTreeSet<RemoteId>>;

  /// Delete the given records, returning how many were removed.
  fn delete_ids(&self, content_type: &str, ids: &BTreeSet<RemoteId>) -> Result<usize>;

  /// All records of a content type ordered by menu order, then id.
  fn list(&self, content_type: &str) -> Result<Vec<CachedRecord>>;

  /// Delete every record of the content type whose id is not in `keep`.
  ///
  /// Returns the deleted ids. An empty `keep` deletes nothing.
  fn delete_where_id_not_in(
    &self,
    content_type: &str,
    keep: &BTreeSet<RemoteId>,
  ) -> Result<BTreeSet<RemoteId>> {
    let stale = stale_ids(&self.remote_ids(content_type)?, keep);
    self.delete_ids(content_type, &stale)?;
    Ok(stale)
  }
}
