//! Cache storage backends: SQLite for durability, in-memory for embedding
//! and tests.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use crate::net::{RequestKey, Snapshot};

use super::traits::{CacheStore, CachedSnapshot, Namespace};

/// SQLite-backed cache storage.
///
/// One row per (namespace, request key); `put` is a single upsert, so
/// concurrent writers race at row granularity and the last completed write
/// wins without torn snapshots.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    Self::open_at(&path)
  }

  /// Open the cache database at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// An in-memory database, used in tests.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("partycache").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for the response cache.
const CACHE_SCHEMA: &str = r#"
-- Snapshots of origin responses, one row per request per namespace
CREATE TABLE IF NOT EXISTS response_cache (
    namespace TEXT NOT NULL,
    request_key TEXT NOT NULL,
    request TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, request_key)
);
"#;

impl CacheStore for SqliteStorage {
  fn get(&self, namespace: Namespace, key: &RequestKey) -> Result<Option<CachedSnapshot>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT status, headers, body, cached_at FROM response_cache
         WHERE namespace = ? AND request_key = ?",
      )
      .map_err(|e| eyre!("Failed to prepare cache query: {}", e))?;

    // Only a missing row is a miss; any other backend error surfaces.
    let row: Option<(i64, String, Vec<u8>, String)> = stmt
      .query_row(params![namespace.as_str(), key.hash()], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .optional()
      .map_err(|e| eyre!("Failed to read cached snapshot for {}: {}", key.describe(), e))?;

    let (status, headers_json, body, cached_at_str) = match row {
      Some(row) => row,
      None => return Ok(None),
    };

    let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)
      .map_err(|e| eyre!("Failed to parse cached headers for {}: {}", key.describe(), e))?;
    let cached_at = parse_datetime(&cached_at_str)?;

    Ok(Some(CachedSnapshot {
      snapshot: Snapshot {
        status: status as u16,
        headers,
        body,
      },
      cached_at,
    }))
  }

  fn put(&self, namespace: Namespace, key: &RequestKey, snapshot: &Snapshot) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers = serde_json::to_string(&snapshot.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO response_cache (namespace, request_key, request, status, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          namespace.as_str(),
          key.hash(),
          key.describe(),
          snapshot.status as i64,
          headers,
          snapshot.body,
        ],
      )
      .map_err(|e| eyre!("Failed to store snapshot for {}: {}", key.describe(), e))?;

    Ok(())
  }
}

/// In-memory cache storage. Nothing survives the process; used by tests and
/// embedders that want the strategy behavior without persistence.
pub struct MemoryStorage {
  entries: Mutex<BTreeMap<(Namespace, String), CachedSnapshot>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(BTreeMap::new()),
    }
  }
}

impl Default for MemoryStorage {
  fn default() -> Self {
    Self::new()
  }
}

impl CacheStore for MemoryStorage {
  fn get(&self, namespace: Namespace, key: &RequestKey) -> Result<Option<CachedSnapshot>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(entries.get(&(namespace, key.hash().to_string())).cloned())
  }

  fn put(&self, namespace: Namespace, key: &RequestKey, snapshot: &Snapshot) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    entries.insert(
      (namespace, key.hash().to_string()),
      CachedSnapshot {
        snapshot: snapshot.clone(),
        cached_at: Utc::now(),
      },
    );

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
