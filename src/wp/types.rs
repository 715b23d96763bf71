//! Domain types shared by the client, the store and the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier assigned by the remote API to one content item.
///
/// Kept in its canonical string form so that `7`, `"7"` and `"007"` name the
/// same item. Numeric ids sort numerically and ahead of any other id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
  /// Accepts JSON strings and integers. Anything else is not an identifier.
  pub fn from_json(value: &Value) -> Option<Self> {
    match value {
      Value::String(s) => Self::parse(s),
      Value::Number(n) => n
        .as_i64()
        .map(|i| i.to_string())
        .or_else(|| n.as_u64().map(|u| u.to_string()))
        .map(Self),
      _ => None,
    }
  }

  /// Parse an identifier typed by a user or stored in the cache.
  pub fn parse(s: &str) -> Option<Self> {
    let s = s.trim();
    if s.is_empty() {
      return None;
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
      let digits = s.trim_start_matches('0');
      let canonical = if digits.is_empty() { "0" } else { digits };
      return Some(Self(canonical.to_string()));
    }
    Some(Self(s.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  fn is_numeric(&self) -> bool {
    self.0.bytes().all(|b| b.is_ascii_digit())
  }
}

impl Ord for RemoteId {
  fn cmp(&self, other: &Self) -> Ordering {
    match (self.is_numeric(), other.is_numeric()) {
      // canonical digits: shorter is smaller
      (true, true) => self
        .0
        .len()
        .cmp(&other.0.len())
        .then_with(|| self.0.cmp(&other.0)),
      (true, false) => Ordering::Less,
      (false, true) => Ordering::Greater,
      (false, false) => self.0.cmp(&other.0),
    }
  }
}

impl PartialOrd for RemoteId {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl From<u64> for RemoteId {
  fn from(id: u64) -> Self {
    Self(id.to_string())
  }
}

impl fmt::Display for RemoteId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Mapped subset of a remote item that is kept in the cache.
///
/// Every sync replaces the whole value; nothing is merged with earlier state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFields {
  pub slug: Option<String>,
  pub title: Option<String>,
  pub status: Option<String>,
  pub content: Option<String>,
  pub excerpt: Option<String>,
  /// Custom fields (Advanced Custom Fields plugin), keyed by field name
  pub acf_fields: Option<BTreeMap<String, Value>>,
  pub author_id: Option<RemoteId>,
  /// Publish date exactly as the API reports it
  pub published_at: Option<String>,
  pub menu_order: Option<i64>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_numeric_ids_are_canonical() {
    assert_eq!(RemoteId::parse("007"), Some(RemoteId::from(7)));
    assert_eq!(RemoteId::from_json(&json!("007")), RemoteId::from_json(&json!(7)));
    assert_eq!(RemoteId::parse(" 42 ").unwrap().as_str(), "42");
    assert_eq!(RemoteId::parse("000").unwrap().as_str(), "0");
    assert_eq!(RemoteId::parse("draft-7").unwrap().as_str(), "draft-7");
    assert_eq!(RemoteId::parse("   "), None);
  }

  #[test]
  fn test_numeric_ordering() {
    let mut ids: Vec<RemoteId> = ["10", "2", "abc", "1", "100", "a2"]
      .iter()
      .filter_map(|s| RemoteId::parse(s))
      .collect();
    ids.sort();

    let order: Vec<&str> = ids.iter().map(RemoteId::as_str).collect();
    assert_eq!(order, vec!["1", "2", "10", "100", "a2", "abc"]);
  }
}
