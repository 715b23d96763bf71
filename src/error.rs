//! Error types for cache synchronization.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures that interrupt a sync and are handed back to the caller.
///
/// Expected conditions (remote reports the item as absent, purge of a missing
/// record, an empty listing) are not errors; they are reported through the
/// outcome types in [`crate::cache`].
#[derive(Error, Debug)]
pub enum SyncError {
  /// Network, timeout or body parse failure while talking to the remote API.
  #[error("failed to fetch /{route}: {message}")]
  FetchFailed { route: String, message: String },

  /// The remote answered with JSON of an unexpected shape.
  #[error("unexpected response for /{route}: {message}")]
  MalformedResponse { route: String, message: String },

  /// No content type with this name was registered at startup.
  #[error("unknown content type: {0}")]
  UnknownContentType(String),

  /// Pagination never reached an empty page.
  #[error("{content_type}: no empty page after {max_pages} pages, refusing to reconcile")]
  PaginationLimit {
    content_type: String,
    max_pages: u32,
  },

  /// The local store failed.
  #[error("storage error: {0}")]
  Storage(color_eyre::Report),
}

impl SyncError {
  pub(crate) fn fetch_failed(route: &str, message: impl ToString) -> Self {
    Self::FetchFailed {
      route: route.to_string(),
      message: message.to_string(),
    }
  }

  pub(crate) fn malformed(route: &str, message: impl ToString) -> Self {
    Self::MalformedResponse {
      route: route.to_string(),
      message: message.to_string(),
    }
  }
}
