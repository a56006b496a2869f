//! Durable key-value store with a change-notification stream.
//! Values are opaque strings; callers own their encoding.
//! `SqliteStore` is the durable backend, `MemoryStore` the fallback when no
//! database path is configured (or the database cannot be opened).

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::StoreError;

/// Well-known store keys (constants to avoid typos).
pub mod keys {
    pub const TARGET_LANGUAGE: &str = "wordglance-target-language";
    pub const SOURCE_LANGUAGE: &str = "wordglance-source-language";
    pub const DARK_MODE: &str = "wordglance-dark-mode";
    pub const TOTAL_WORDS_LEARNED: &str = "wordglance-total-words-learned";
    pub const CACHE_DEFINITIONS: &str = "wordglance-cache-definitions";
    pub const CACHE_TRANSLATIONS: &str = "wordglance-cache-translations";
}

/// Buffered change events per subscriber before it starts lagging.
const CHANGE_BUFFER: usize = 64;

/// One write, as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: String,
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` and notify subscribers.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Stream of every subsequent `set`.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Process-local store. Nothing survives a restart.
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            values: Mutex::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let old_value = self.values.lock().insert(key.to_string(), value.to_string());
        // No subscribers is fine.
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            old_value,
            new_value: value.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

/// SQLite-backed store: one `kv` table, WAL journal.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteStore {
    /// Open (or create) the store database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let store = Self::with_connection(conn)?;
        info!(path = %db_path.display(), "sqlite store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let old_value = {
            let conn = self.conn.lock();
            let tx = conn.unchecked_transaction()?;
            let old: Option<String> = tx
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()?;
            tx.execute(
                "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, now_unix()],
            )?;
            tx.commit()?;
            old
        };
        debug!(key, bytes = value.len(), "store write");
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            old_value,
            new_value: value.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

/// Current time as Unix timestamp (seconds).
fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn KeyValueStore) {
        let mut rx = store.subscribe();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.old_value, None);
        assert_eq!(first.new_value, "one");
        let second = rx.try_recv().unwrap();
        assert_eq!(second.old_value.as_deref(), Some("one"));
        assert_eq!(second.new_value, "two");
    }

    #[test]
    fn memory_store_roundtrip_and_notifications() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn sqlite_store_roundtrip_and_notifications() {
        exercise(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("wordglance-target-language", "fr").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get("wordglance-target-language").unwrap().as_deref(),
            Some("fr")
        );
    }
}
