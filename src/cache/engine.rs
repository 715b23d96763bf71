//! Sync engine that mirrors remote content into the local store.

use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::default_invalid_response_codes;
use crate::error::{SyncError, SyncResult};
use crate::registry::{ContentType, ContentTypeRegistry};
use crate::wp::api_types::{classify_item, item_id, listing_items, ItemResponse};
use crate::wp::{ApiClient, RemoteId, Route};

use super::reconcile::Reconciliation;
use super::traits::{ContentStore, Lookup, Upserted};

/// Result of a single-item sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
  /// The item was not cached before
  Created,
  /// The cached copy was overwritten
  Updated,
  /// The remote reported the item as missing; the cache was left alone
  RemoteAbsent { code: String },
  /// The id was neither a string nor an integer; nothing was attempted
  Ignored,
}

impl From<Upserted> for SyncOutcome {
  fn from(upserted: Upserted) -> Self {
    match upserted {
      Upserted::Created => SyncOutcome::Created,
      Upserted::Updated => SyncOutcome::Updated,
    }
  }
}

/// Summary of a full sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncAllReport {
  /// Listing requests made, including the final empty page
  pub pages: u32,
  pub created: usize,
  pub updated: usize,
  /// Listing items without a usable id
  pub skipped: usize,
  pub reconciliation: Reconciliation,
}

impl SyncAllReport {
  pub fn upserted(&self) -> usize {
    self.created + self.updated
  }
}

/// Result of a purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
  Purged,
  /// No record with that id was cached
  Missing,
}

/// Mirrors remote content into a [`ContentStore`].
///
/// Stateless between calls. Callers must not run `sync_all` for a content type
/// concurrently with any other operation on that type; see
/// [`crate::scheduler::SyncScheduler`].
pub struct CacheSyncEngine<C: ApiClient, S: ContentStore> {
  client: C,
  store: Arc<S>,
  registry: Arc<ContentTypeRegistry>,
  /// Error codes that mean the remote item does not exist
  invalid_codes: BTreeSet<String>,
  max_pages: u32,
}

impl<C: ApiClient, S: ContentStore> CacheSyncEngine<C, S> {
  pub fn new(client: C, store: S, registry: ContentTypeRegistry) -> Self {
    Self {
      client,
      store: Arc::new(store),
      registry: Arc::new(registry),
      invalid_codes: default_invalid_response_codes(),
      max_pages: 1000,
    }
  }

  /// Set the error codes treated as "item does not exist".
  pub fn with_invalid_codes(mut self, codes: BTreeSet<String>) -> Self {
    self.invalid_codes = codes;
    self
  }

  /// Set the page ceiling for paginated full syncs.
  pub fn with_max_pages(mut self, max_pages: u32) -> Self {
    self.max_pages = max_pages;
    self
  }

  pub fn client(&self) -> &C {
    &self.client
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn registry(&self) -> &ContentTypeRegistry {
    &self.registry
  }

  fn content_type(&self, name: &str) -> SyncResult<&ContentType> {
    self
      .registry
      .get(name)
      .ok_or_else(|| SyncError::UnknownContentType(name.to_string()))
  }

  /// Fetch one item and find-or-create its cached record.
  ///
  /// `remote_id` is taken as raw JSON because it usually comes straight from
  /// a webhook or queued job; anything but a string or integer is ignored.
  pub async fn sync_one(
    &self,
    content_type: &str,
    remote_id: &Value,
    preview: bool,
  ) -> SyncResult<SyncOutcome> {
    let Some(id) = RemoteId::from_json(remote_id) else {
      debug!(content_type, %remote_id, "ignoring sync request with invalid id");
      return Ok(SyncOutcome::Ignored);
    };

    let ct = self.content_type(content_type)?;
    let route = Route::item(&ct.route, &id, preview);
    let body = self.client.fetch(&route, None).await?;

    match classify_item(&body) {
      ItemResponse::Item(_) => {
        let fields = (ct.map_fields)(&body);
        let upserted = self
          .store
          .upsert(&ct.name, &id, &fields)
          .map_err(SyncError::Storage)?;
        debug!(content_type, id = %id, ?upserted, "synced");
        Ok(upserted.into())
      }
      ItemResponse::Envelope { code } if self.invalid_codes.contains(code) => {
        info!(content_type, id = %id, code, "remote reports item as absent, cache untouched");
        Ok(SyncOutcome::RemoteAbsent {
          code: code.to_string(),
        })
      }
      ItemResponse::Envelope { code } => Err(SyncError::malformed(
        route.as_str(),
        format!("remote returned error code '{}'", code),
      )),
      ItemResponse::Unexpected(reason) => Err(SyncError::malformed(route.as_str(), reason)),
    }
  }

  /// Fetch the whole listing, upsert every item and delete cached records
  /// that are no longer listed.
  ///
  /// Paginated listings are walked from page 0 until a page comes back empty.
  /// A failure part way keeps what was already upserted and skips deletion.
  pub async fn sync_all(&self, content_type: &str) -> SyncResult<SyncAllReport> {
    let ct = self.content_type(content_type)?;
    let route = Route::listing(&ct.route);
    let mut report = SyncAllReport::default();
    let mut observed = BTreeSet::new();

    if ct.paginated {
      let mut page = 0;
      loop {
        if page >= self.max_pages {
          return Err(SyncError::PaginationLimit {
            content_type: ct.name.clone(),
            max_pages: self.max_pages,
          });
        }

        let body = self.client.fetch(&route, Some(page)).await?;
        report.pages += 1;
        let items = listing_items(&body).map_err(|m| SyncError::malformed(route.as_str(), m))?;
        debug!(content_type, page, items = items.len(), "fetched page");

        if items.is_empty() {
          break;
        }
        self.upsert_items(ct, items, &mut observed, &mut report)?;
        page += 1;
      }
    } else {
      let body = self.client.fetch(&route, None).await?;
      report.pages = 1;
      let items = listing_items(&body).map_err(|m| SyncError::malformed(route.as_str(), m))?;
      self.upsert_items(ct, items, &mut observed, &mut report)?;
    }

    report.reconciliation = if observed.is_empty() {
      warn!(
        content_type,
        "remote listing was empty, skipping deletion of cached records"
      );
      Reconciliation::Skipped
    } else {
      let deleted = self
        .store
        .delete_where_id_not_in(&ct.name, &observed)
        .map_err(SyncError::Storage)?;
      Reconciliation::Applied { deleted }
    };

    info!(
      content_type,
      pages = report.pages,
      created = report.created,
      updated = report.updated,
      skipped = report.skipped,
      deleted = match &report.reconciliation {
        Reconciliation::Applied { deleted } => deleted.len(),
        Reconciliation::Skipped => 0,
      },
      "full sync finished"
    );

    Ok(report)
  }

  fn upsert_items(
    &self,
    ct: &ContentType,
    items: &[Value],
    observed: &mut BTreeSet<RemoteId>,
    report: &mut SyncAllReport,
  ) -> SyncResult<()> {
    for item in items {
      let id = match item_id(item) {
        Some(id) if item.is_object() => id,
        _ => {
          warn!(content_type = %ct.name, "listing item without a usable id, skipped");
          report.skipped += 1;
          continue;
        }
      };

      let fields = (ct.map_fields)(item);
      match self
        .store
        .upsert(&ct.name, &id, &fields)
        .map_err(SyncError::Storage)?
      {
        Upserted::Created => report.created += 1,
        Upserted::Updated => report.updated += 1,
      }
      observed.insert(id);
    }
    Ok(())
  }

  /// Delete one cached record.
  ///
  /// Purging an id that is not cached is not an error, but it is logged since
  /// it points at drift between the remote and the cache.
  pub async fn purge(&self, content_type: &str, remote_id: &RemoteId) -> SyncResult<PurgeOutcome> {
    let ct = self.content_type(content_type)?;

    match self
      .store
      .find(&ct.name, remote_id)
      .map_err(SyncError::Storage)?
    {
      Lookup::Found(record) => {
        self
          .store
          .delete(&ct.name, &record.remote_id)
          .map_err(SyncError::Storage)?;
        info!(content_type, id = %remote_id, "purged");
        Ok(PurgeOutcome::Purged)
      }
      Lookup::NotFound => {
        warn!(
          "Could not purge {} with id {}, no record with that id was found.",
          content_type, remote_id
        );
        Ok(PurgeOutcome::Missing)
      }
    }
  }
}
