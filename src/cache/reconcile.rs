//! Decides which cached records a full sync removes.

use std::collections::BTreeSet;

use crate::wp::RemoteId;

/// Outcome of the reconciliation step of a full sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Reconciliation {
  /// Records absent from the remote listing were deleted
  Applied { deleted: BTreeSet<RemoteId> },
  /// The listing was empty, so nothing was deleted
  #[default]
  Skipped,
}

/// Cached ids that were not observed remotely.
///
/// An empty `observed` set yields nothing: an empty listing is far more likely
/// an upstream outage than a site with no content, and must never wipe the
/// cache.
pub fn stale_ids(cached: &BTreeSet<RemoteId>, observed: &BTreeSet<RemoteId>) -> BTreeSet<RemoteId> {
  if observed.is_empty() {
    return BTreeSet::new();
  }
  cached.difference(observed).cloned().collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ids(raw: &[u64]) -> BTreeSet<RemoteId> {
    raw.iter().copied().map(RemoteId::from).collect()
  }

  /// Every subset of {1, 2, 3, 4} as an id set.
  fn subsets() -> Vec<BTreeSet<RemoteId>> {
    (0u32..16)
      .map(|mask| {
        (1u64..=4)
          .filter(|bit| mask & (1 << (bit - 1)) != 0)
          .map(RemoteId::from)
          .collect()
      })
      .collect()
  }

  #[test]
  fn test_difference() {
    assert_eq!(stale_ids(&ids(&[1, 2, 3]), &ids(&[2, 3, 4])), ids(&[1]));
  }

  #[test]
  fn test_empty_observed_deletes_nothing() {
    assert!(stale_ids(&ids(&[1, 2, 3]), &BTreeSet::new()).is_empty());
  }

  #[test]
  fn test_all_subsets() {
    for cached in subsets() {
      for observed in subsets() {
        let stale = stale_ids(&cached, &observed);
        if observed.is_empty() {
          assert!(stale.is_empty());
          continue;
        }
        let expected: BTreeSet<RemoteId> = cached.difference(&observed).cloned().collect();
        assert_eq!(stale, expected);
        assert!(stale.is_disjoint(&observed));
        assert!(stale.is_subset(&cached));
      }
    }
  }
}
