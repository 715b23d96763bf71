//! SQLite implementation of the content store.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::wp::{RecordFields, RemoteId};

use super::reconcile::stale_ids;
use super::traits::{CachedRecord, ContentStore, Lookup, Upserted};

/// SQLite-based content store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open or create the store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Store that lives only as long as the process.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cached_records (
    content_type TEXT NOT NULL,
    remote_id TEXT NOT NULL,
    fields BLOB NOT NULL,
    menu_order INTEGER,
    synced_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (content_type, remote_id)
);
"#;

impl ContentStore for SqliteStore {
  fn find(&self, content_type: &str, remote_id: &RemoteId) -> Result<Lookup> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT fields, synced_at FROM cached_records
         WHERE content_type = ? AND remote_id = ?",
        params![content_type, remote_id.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {} {}: {}", content_type, remote_id, e))?;

    match row {
      Some((data, synced_at)) => Ok(Lookup::Found(decode_record(
        content_type,
        remote_id.clone(),
        &data,
        &synced_at,
      )?)),
      None => Ok(Lookup::NotFound),
    }
  }

  fn upsert(
    &self,
    content_type: &str,
    remote_id: &RemoteId,
    fields: &RecordFields,
  ) -> Result<Upserted> {
    let data =
      serde_json::to_vec(fields).map_err(|e| eyre!("Failed to serialize fields: {}", e))?;

    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let exists = tx
      .query_row(
        "SELECT 1 FROM cached_records WHERE content_type = ? AND remote_id = ?",
        params![content_type, remote_id.as_str()],
        |_| Ok(()),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {} {}: {}", content_type, remote_id, e))?
      .is_some();

    tx.execute(
      "INSERT INTO cached_records (content_type, remote_id, fields, menu_order, synced_at)
       VALUES (?, ?, ?, ?, datetime('now'))
       ON CONFLICT (content_type, remote_id) DO UPDATE SET
         fields = excluded.fields,
         menu_order = excluded.menu_order,
         synced_at = excluded.synced_at",
      params![content_type, remote_id.as_str(), data, fields.menu_order],
    )
    .map_err(|e| eyre!("Failed to store {} {}: {}", content_type, remote_id, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(if exists {
      Upserted::Updated
    } else {
      Upserted::Created
    })
  }

  fn delete(&self, content_type: &str, remote_id: &RemoteId) -> Result<bool> {
    let deleted = self
      .lock()?
      .execute(
        "DELETE FROM cached_records WHERE content_type = ? AND remote_id = ?",
        params![content_type, remote_id.as_str()],
      )
      .map_err(|e| eyre!("Failed to delete {} {}: {}", content_type, remote_id, e))?;

    Ok(deleted > 0)
  }

  fn remote_ids(&self, content_type: &str) -> Result<BTreeSet<RemoteId>> {
    let conn = self.lock()?;
    select_ids(&conn, content_type)
  }

  fn delete_ids(&self, content_type: &str, ids: &BTreeSet<RemoteId>) -> Result<usize> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let deleted = delete_in(&tx, content_type, ids)?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(deleted)
  }

  fn list(&self, content_type: &str) -> Result<Vec<CachedRecord>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare(
        "SELECT remote_id, fields, synced_at FROM cached_records
         WHERE content_type = ?
         ORDER BY menu_order IS NULL, menu_order",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows: Vec<(String, Vec<u8>, String)> = stmt
      .query_map(params![content_type], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
      })
      .map_err(|e| eyre!("Failed to query records: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read records: {}", e))?;

    let mut records = rows
      .into_iter()
      .map(|(id, data, synced_at)| {
        let remote_id =
          RemoteId::parse(&id).ok_or_else(|| eyre!("Empty remote id stored for {}", content_type))?;
        decode_record(content_type, remote_id, &data, &synced_at)
      })
      .collect::<Result<Vec<_>>>()?;

    // Ties on menu_order fall back to RemoteId order, numeric ids numerically
    records.sort_by(|a, b| {
      let rank = |r: &CachedRecord| (r.fields.menu_order.is_none(), r.fields.menu_order);
      rank(a)
        .cmp(&rank(b))
        .then_with(|| a.remote_id.cmp(&b.remote_id))
    });
    Ok(records)
  }

  /// Reads and deletes under one transaction so a concurrent upsert cannot
  /// slip between the two.
  fn delete_where_id_not_in(
    &self,
    content_type: &str,
    keep: &BTreeSet<RemoteId>,
  ) -> Result<BTreeSet<RemoteId>> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let stale = stale_ids(&select_ids(&tx, content_type)?, keep);
    delete_in(&tx, content_type, &stale)?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(stale)
  }
}

fn select_ids(conn: &Connection, content_type: &str) -> Result<BTreeSet<RemoteId>> {
  let mut stmt = conn
    .prepare("SELECT remote_id FROM cached_records WHERE content_type = ?")
    .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

  let ids: Vec<String> = stmt
    .query_map(params![content_type], |row| row.get(0))
    .map_err(|e| eyre!("Failed to query ids: {}", e))?
    .collect::<rusqlite::Result<_>>()
    .map_err(|e| eyre!("Failed to read ids: {}", e))?;

  Ok(ids.iter().filter_map(|id| RemoteId::parse(id)).collect())
}

fn delete_in(conn: &Connection, content_type: &str, ids: &BTreeSet<RemoteId>) -> Result<usize> {
  let mut stmt = conn
    .prepare("DELETE FROM cached_records WHERE content_type = ? AND remote_id = ?")
    .map_err(|e| eyre!("Failed to prepare delete: {}", e))?;

  let mut deleted = 0;
  for id in ids {
    deleted += stmt
      .execute(params![content_type, id.as_str()])
      .map_err(|e| eyre!("Failed to delete {} {}: {}", content_type, id, e))?;
  }
  Ok(deleted)
}

fn decode_record(
  content_type: &str,
  remote_id: RemoteId,
  data: &[u8],
  synced_at: &str,
) -> Result<CachedRecord> {
  let fields: RecordFields = serde_json::from_slice(data)
    .map_err(|e| eyre!("Failed to deserialize {} {}: {}", content_type, remote_id, e))?;

  Ok(CachedRecord {
    content_type: content_type.to_string(),
    remote_id,
    fields,
    synced_at: parse_datetime(synced_at)?,
  })
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fields(title: &str) -> RecordFields {
    RecordFields {
      title: Some(title.to_string()),
      ..Default::default()
    }
  }

  fn ids(raw: &[u64]) -> BTreeSet<RemoteId> {
    raw.iter().copied().map(RemoteId::from).collect()
  }

  #[test]
  fn test_upsert_creates_then_updates() {
    let store = SqliteStore::open_in_memory().unwrap();
    let id = RemoteId::from(1);

    assert_eq!(
      store.upsert("post", &id, &fields("first")).unwrap(),
      Upserted::Created
    );
    assert_eq!(
      store.upsert("post", &id, &fields("second")).unwrap(),
      Upserted::Updated
    );

    match store.find("post", &id).unwrap() {
      Lookup::Found(record) => {
        assert_eq!(record.fields.title.as_deref(), Some("second"));
        assert_eq!(record.content_type, "post");
      }
      Lookup::NotFound => panic!("record should exist"),
    }
    assert_eq!(store.remote_ids("post").unwrap(), ids(&[1]));
  }

  #[test]
  fn test_content_types_are_separate() {
    let store = SqliteStore::open_in_memory().unwrap();
    let id = RemoteId::from(5);

    store.upsert("post", &id, &fields("post")).unwrap();
    assert_eq!(store.find("page", &id).unwrap(), Lookup::NotFound);
    assert!(!store.delete("page", &id).unwrap());
    assert!(store.delete("post", &id).unwrap());
    assert_eq!(store.find("post", &id).unwrap(), Lookup::NotFound);
  }

  #[test]
  fn test_delete_where_id_not_in() {
    let store = SqliteStore::open_in_memory().unwrap();
    for id in [1, 2, 3] {
      store
        .upsert("post", &RemoteId::from(id), &fields("x"))
        .unwrap();
    }
    store.upsert("page", &RemoteId::from(1), &fields("x")).unwrap();

    let deleted = store.delete_where_id_not_in("post", &ids(&[2, 3, 4])).unwrap();
    assert_eq!(deleted, ids(&[1]));
    assert_eq!(store.remote_ids("post").unwrap(), ids(&[2, 3]));
    // other content types untouched
    assert_eq!(store.remote_ids("page").unwrap(), ids(&[1]));

    let deleted = store.delete_where_id_not_in("post", &BTreeSet::new()).unwrap();
    assert!(deleted.is_empty());
    assert_eq!(store.remote_ids("post").unwrap(), ids(&[2, 3]));
  }

  #[test]
  fn test_list_orders_by_menu_order() {
    let store = SqliteStore::open_in_memory().unwrap();
    let ranked = |order: Option<i64>| RecordFields {
      menu_order: order,
      ..Default::default()
    };

    store.upsert("page", &RemoteId::from(1), &ranked(None)).unwrap();
    store.upsert("page", &RemoteId::from(2), &ranked(Some(5))).unwrap();
    store.upsert("page", &RemoteId::from(3), &ranked(Some(1))).unwrap();

    let order: Vec<String> = store
      .list("page")
      .unwrap()
      .into_iter()
      .map(|r| r.remote_id.to_string())
      .collect();
    assert_eq!(order, vec!["3", "2", "1"]);
  }

  #[test]
  fn test_list_breaks_ties_by_numeric_id() {
    let store = SqliteStore::open_in_memory().unwrap();
    for id in [10, 2, 1] {
      store
        .upsert("post", &RemoteId::from(id), &RecordFields::default())
        .unwrap();
    }

    let order: Vec<String> = store
      .list("post")
      .unwrap()
      .into_iter()
      .map(|r| r.remote_id.to_string())
      .collect();
    assert_eq!(order, vec!["1", "2", "10"]);
  }

  #[test]
  fn test_open_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");
    {
      let store = SqliteStore::open(&path).unwrap();
      store.upsert("post", &RemoteId::from(9), &fields("kept")).unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.remote_ids("post").unwrap(), ids(&[9]));
  }
}
