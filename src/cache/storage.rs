//! Cache storage trait with SQLite and in-memory implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::traits::{Method, Request, Response};

/// A response found in a cache bucket.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  /// The stored response
  pub response: Response,
  /// Bucket (generation) it was found in
  pub bucket: String,
  /// When it was stored
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Buckets are named groups of entries; one entry per request identity.
pub trait CacheStorage: Send + Sync + 'static {
  /// Names of all buckets, oldest first.
  fn bucket_names(&self) -> Result<Vec<String>>;

  fn has_bucket(&self, name: &str) -> Result<bool> {
    Ok(self.bucket_names()?.iter().any(|b| b == name))
  }

  /// Delete a bucket and all its entries. Returns false if it didn't exist.
  fn delete_bucket(&self, name: &str) -> Result<bool>;

  /// Store one entry, replacing any entry with the same request identity.
  /// Opens the bucket if needed.
  fn put(&self, bucket: &str, request: &Request, response: &Response) -> Result<()>;

  /// Create the bucket and store all entries, or nothing at all.
  fn put_all(&self, bucket: &str, entries: &[(Request, Response)]) -> Result<()>;

  /// Look a request up across all buckets, oldest bucket first.
  fn match_request(&self, request: &Request) -> Result<Option<CachedResponse>>;

  /// Look a request up in one bucket.
  fn match_in(&self, bucket: &str, request: &Request) -> Result<Option<CachedResponse>>;

  /// Requests stored in a bucket, in insertion order.
  fn keys(&self, bucket: &str) -> Result<Vec<Request>>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the storage at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the storage at a specific path.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Non-persistent SQLite storage.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("lanerun").join("cache.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- One row per generation bucket
CREATE TABLE IF NOT EXISTS buckets (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses, one per request identity per bucket
CREATE TABLE IF NOT EXISTS entries (
    bucket TEXT NOT NULL,
    entry_key TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (bucket, entry_key),
    FOREIGN KEY (bucket) REFERENCES buckets(name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entries_key ON entries(entry_key);
"#;

/// Row shape shared by the lookup queries.
type EntryRow = (String, u16, String, Vec<u8>, String);

fn insert_entry(
  conn: &Connection,
  bucket: &str,
  request: &Request,
  response: &Response,
) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO entries (bucket, entry_key, method, url, status, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        bucket,
        request.cache_key(),
        request.method.as_str(),
        request.url,
        response.status,
        headers,
        response.body
      ],
    )
    .map_err(|e| eyre!("Failed to store entry for {}: {}", request.url, e))?;

  Ok(())
}

fn row_to_cached((bucket, status, headers, body, cached_at): EntryRow) -> Result<CachedResponse> {
  let headers: Vec<(String, String)> = serde_json::from_str(&headers)
    .map_err(|e| eyre!("Failed to deserialize headers: {}", e))?;

  Ok(CachedResponse {
    response: Response {
      status,
      headers,
      body,
    },
    bucket,
    cached_at: parse_datetime(&cached_at)?,
  })
}

impl CacheStorage for SqliteStorage {
  fn bucket_names(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT name FROM buckets ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list buckets: {}", e))?
      .collect::<std::result::Result<Vec<String>, _>>()
      .map_err(|e| eyre!("Failed to read bucket name: {}", e))?;

    Ok(names)
  }

  fn delete_bucket(&self, name: &str) -> Result<bool> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute("DELETE FROM entries WHERE bucket = ?", params![name])
      .map_err(|e| eyre!("Failed to delete entries of {}: {}", name, e))?;
    let removed = tx
      .execute("DELETE FROM buckets WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete bucket {}: {}", name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn put(&self, bucket: &str, request: &Request, response: &Response) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT OR IGNORE INTO buckets (name) VALUES (?)",
      params![bucket],
    )
    .map_err(|e| eyre!("Failed to open bucket {}: {}", bucket, e))?;
    insert_entry(&tx, bucket, request, response)?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn put_all(&self, bucket: &str, entries: &[(Request, Response)]) -> Result<()> {
    let mut conn = self.lock()?;

    // Dropping the transaction without commit rolls everything back
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT OR IGNORE INTO buckets (name) VALUES (?)",
      params![bucket],
    )
    .map_err(|e| eyre!("Failed to open bucket {}: {}", bucket, e))?;

    for (request, response) in entries {
      insert_entry(&tx, bucket, request, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn match_request(&self, request: &Request) -> Result<Option<CachedResponse>> {
    let conn = self.lock()?;

    let row: Option<EntryRow> = conn
      .query_row(
        "SELECT e.bucket, e.status, e.headers, e.body, e.cached_at FROM entries e
         INNER JOIN buckets b ON b.name = e.bucket
         WHERE e.entry_key = ?
         ORDER BY b.rowid
         LIMIT 1",
        params![request.cache_key()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", request.url, e))?;

    row.map(row_to_cached).transpose()
  }

  fn match_in(&self, bucket: &str, request: &Request) -> Result<Option<CachedResponse>> {
    let conn = self.lock()?;

    let row: Option<EntryRow> = conn
      .query_row(
        "SELECT bucket, status, headers, body, cached_at FROM entries
         WHERE bucket = ? AND entry_key = ?",
        params![bucket, request.cache_key()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {} in {}: {}", request.url, bucket, e))?;

    row.map(row_to_cached).transpose()
  }

  fn keys(&self, bucket: &str) -> Result<Vec<Request>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT method, url FROM entries WHERE bucket = ? ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let keys = stmt
      .query_map(params![bucket], |row| {
        let method: String = row.get(0)?;
        let url: String = row.get(1)?;
        Ok(Request::new(Method::parse(&method), url))
      })
      .map_err(|e| eyre!("Failed to list entries of {}: {}", bucket, e))?
      .collect::<std::result::Result<Vec<_>, _>>()
      .map_err(|e| eyre!("Failed to read entry: {}", e))?;

    Ok(keys)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

/// Storage that lives only as long as the process.
#[derive(Default)]
pub struct MemoryStorage {
  // Vec keeps bucket creation order; entries keep insertion order
  buckets: Mutex<Vec<(String, BTreeMap<String, MemoryEntry>)>>,
  sequence: AtomicU64,
}

#[derive(Clone)]
struct MemoryEntry {
  seq: u64,
  request: Request,
  response: Response,
  cached_at: DateTime<Utc>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<MutexGuard<'_, Vec<(String, BTreeMap<String, MemoryEntry>)>>> {
    self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  fn entry(&self, request: &Request, response: &Response) -> MemoryEntry {
    MemoryEntry {
      seq: self.sequence.fetch_add(1, Ordering::Relaxed),
      request: request.clone(),
      response: response.clone(),
      cached_at: Utc::now(),
    }
  }
}

fn bucket_mut<'a>(
  buckets: &'a mut Vec<(String, BTreeMap<String, MemoryEntry>)>,
  name: &str,
) -> &'a mut BTreeMap<String, MemoryEntry> {
  let index = match buckets.iter().position(|(n, _)| n == name) {
    Some(i) => i,
    None => {
      buckets.push((name.to_string(), BTreeMap::new()));
      buckets.len() - 1
    }
  };
  &mut buckets[index].1
}

impl CacheStorage for MemoryStorage {
  fn bucket_names(&self) -> Result<Vec<String>> {
    Ok(self.lock()?.iter().map(|(n, _)| n.clone()).collect())
  }

  fn delete_bucket(&self, name: &str) -> Result<bool> {
    let mut buckets = self.lock()?;
    let before = buckets.len();
    buckets.retain(|(n, _)| n != name);
    Ok(buckets.len() != before)
  }

  fn put(&self, bucket: &str, request: &Request, response: &Response) -> Result<()> {
    let entry = self.entry(request, response);
    let mut buckets = self.lock()?;
    bucket_mut(&mut buckets, bucket).insert(request.cache_key(), entry);
    Ok(())
  }

  fn put_all(&self, bucket: &str, entries: &[(Request, Response)]) -> Result<()> {
    let prepared: Vec<(String, MemoryEntry)> = entries
      .iter()
      .map(|(req, resp)| (req.cache_key(), self.entry(req, resp)))
      .collect();

    let mut buckets = self.lock()?;
    bucket_mut(&mut buckets, bucket).extend(prepared);
    Ok(())
  }

  fn match_request(&self, request: &Request) -> Result<Option<CachedResponse>> {
    let key = request.cache_key();
    let buckets = self.lock()?;

    Ok(buckets.iter().find_map(|(name, entries)| {
      entries.get(&key).map(|e| CachedResponse {
        response: e.response.clone(),
        bucket: name.clone(),
        cached_at: e.cached_at,
      })
    }))
  }

  fn match_in(&self, bucket: &str, request: &Request) -> Result<Option<CachedResponse>> {
    let key = request.cache_key();
    let buckets = self.lock()?;

    Ok(
      buckets
        .iter()
        .find(|(name, _)| name == bucket)
        .and_then(|(name, entries)| {
          entries.get(&key).map(|e| CachedResponse {
            response: e.response.clone(),
            bucket: name.clone(),
            cached_at: e.cached_at,
          })
        }),
    )
  }

  fn keys(&self, bucket: &str) -> Result<Vec<Request>> {
    let buckets = self.lock()?;

    let mut entries: Vec<&MemoryEntry> = buckets
      .iter()
      .find(|(name, _)| name == bucket)
      .map(|(_, entries)| entries.values().collect())
      .unwrap_or_default();
    entries.sort_by_key(|e| e.seq);

    Ok(entries.into_iter().map(|e| e.request.clone()).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Object-safe view over the generic trait for table-driven tests.
  trait StorageOps {
    fn bucket_names(&self) -> Vec<String>;
    fn has_bucket(&self, name: &str) -> bool;
    fn delete_bucket(&self, name: &str) -> bool;
    fn put(&self, bucket: &str, request: &Request, response: &Response);
    fn put_all(&self, bucket: &str, entries: &[(Request, Response)]);
    fn match_request(&self, request: &Request) -> Option<CachedResponse>;
    fn match_in(&self, bucket: &str, request: &Request) -> Option<CachedResponse>;
    fn keys(&self, bucket: &str) -> Vec<Request>;
  }

  impl<T: CacheStorage> StorageOps for T {
    fn bucket_names(&self) -> Vec<String> {
      CacheStorage::bucket_names(self).unwrap()
    }
    fn has_bucket(&self, name: &str) -> bool {
      CacheStorage::has_bucket(self, name).unwrap()
    }
    fn delete_bucket(&self, name: &str) -> bool {
      CacheStorage::delete_bucket(self, name).unwrap()
    }
    fn put(&self, bucket: &str, request: &Request, response: &Response) {
      CacheStorage::put(self, bucket, request, response).unwrap()
    }
    fn put_all(&self, bucket: &str, entries: &[(Request, Response)]) {
      CacheStorage::put_all(self, bucket, entries).unwrap()
    }
    fn match_request(&self, request: &Request) -> Option<CachedResponse> {
      CacheStorage::match_request(self, request).unwrap()
    }
    fn match_in(&self, bucket: &str, request: &Request) -> Option<CachedResponse> {
      CacheStorage::match_in(self, bucket, request).unwrap()
    }
    fn keys(&self, bucket: &str) -> Vec<Request> {
      CacheStorage::keys(self, bucket).unwrap()
    }
  }

  fn backends() -> Vec<(&'static str, Box<dyn StorageOps>)> {
    vec![
      ("sqlite", Box::new(SqliteStorage::open_in_memory().unwrap())),
      ("memory", Box::new(MemoryStorage::new())),
    ]
  }

  #[test]
  fn test_put_then_match() {
    for (name, s) in backends() {
      let response = Response::new(200, "<html>").with_header("Content-Type", "text/html");

      s.put("v1", &Request::get("index.html"), &response);

      let found = s.match_request(&Request::get("index.html")).unwrap();
      assert_eq!(found.response, response, "{name}");
      assert_eq!(found.bucket, "v1", "{name}");
      assert!(s.match_request(&Request::get("other.html")).is_none(), "{name}");
    }
  }

  #[test]
  fn test_put_replaces_same_identity() {
    for (name, s) in backends() {
      let request = Request::get("app.js");

      s.put("v1", &request, &Response::new(200, "old"));
      s.put("v1", &request, &Response::new(200, "new"));

      assert_eq!(s.match_request(&request).unwrap().response.body, b"new", "{name}");
      assert_eq!(s.keys("v1").len(), 1, "{name}");
    }
  }

  #[test]
  fn test_match_prefers_oldest_bucket() {
    for (name, s) in backends() {
      let request = Request::get("/");

      s.put("v1", &request, &Response::new(200, "first"));
      s.put("v2", &request, &Response::new(200, "second"));

      assert_eq!(s.match_request(&request).unwrap().bucket, "v1", "{name}");
      assert_eq!(
        s.match_in("v2", &request).unwrap().response.body,
        b"second",
        "{name}"
      );
    }
  }

  #[test]
  fn test_delete_bucket_drops_entries() {
    for (name, s) in backends() {

      s.put_all(
        "old",
        &[
          (Request::get("a"), Response::new(200, "a")),
          (Request::get("b"), Response::new(200, "b")),
        ],
      );

      assert!(s.has_bucket("old"), "{name}");
      assert!(s.delete_bucket("old"), "{name}");
      assert!(!s.delete_bucket("old"), "{name}");
      assert!(s.bucket_names().is_empty(), "{name}");
      assert!(s.match_request(&Request::get("a")).is_none(), "{name}");
    }
  }

  #[test]
  fn test_keys_in_insertion_order() {
    for (name, s) in backends() {

      s.put_all(
        "v1",
        &[
          (Request::get("/"), Response::new(200, "root")),
          (Request::get("index.html"), Response::new(200, "index")),
          (Request::get("icon-192.png"), Response::new(200, "png")),
        ],
      );

      let urls: Vec<String> = s.keys("v1").into_iter().map(|r| r.url).collect();
      assert_eq!(urls, vec!["/", "index.html", "icon-192.png"], "{name}");
    }
  }

  #[test]
  fn test_sqlite_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("cache.db");

    {
      let storage = SqliteStorage::open_at(&path).unwrap();
      StorageOps::put(
        &storage,
        "v1",
        &Request::get("index.html"),
        &Response::new(200, "hello"),
      );
    }

    let storage = SqliteStorage::open_at(&path).unwrap();
    let found = StorageOps::match_request(&storage, &Request::get("index.html")).unwrap();
    assert_eq!(found.response.body, b"hello");
    assert_eq!(StorageOps::bucket_names(&storage), vec!["v1"]);
  }

  #[test]
  fn test_parse_datetime() {
    let dt = parse_datetime("2024-05-01 12:30:00").unwrap();
    assert_eq!(dt.to_rfc3339(), "2024-05-01T12:30:00+00:00");
    assert!(parse_datetime("yesterday").is_err());
  }
}
