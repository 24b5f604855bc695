//! `SqliteStore`: the identity store key space in a SQLite database.
//!
//! Every key is registered in `store_keys` with its kind; values live in one
//! table per kind. All access goes through a single connection behind a
//! mutex, and every multi-statement operation runs in a SQLite transaction.

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::interfaces::IdentityStore;
use crate::types::{StoreTransaction, TransactionOp};
use catalog_indexer_shared::{Entry, EntryId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS store_keys (
        key  TEXT PRIMARY KEY,
        kind TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS store_strings (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS store_set_members (
        key    TEXT NOT NULL,
        member TEXT NOT NULL,
        PRIMARY KEY (key, member)
    );
    CREATE TABLE IF NOT EXISTS store_map_entries (
        key    TEXT NOT NULL,
        id     TEXT NOT NULL,
        record TEXT NOT NULL,
        PRIMARY KEY (key, id)
    );
";

const VALUE_TABLES: [&str; 3] = ["store_strings", "store_set_members", "store_map_entries"];

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    Set,
    Map,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Set => "set",
            Kind::Map => "map",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StoreError::unavailable(e.to_string())
            }
            _ => StoreError::backend(e.to_string()),
        }
    }
}

/// Identity store persisted in a SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::backend(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self::init(conn)?;

        info!(path = %path.display(), "Identity store opened");
        Ok(store)
    }

    /// Open a database that lives only as long as the store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` inside a transaction that commits only if `f` succeeds.
    fn with_tx<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::backend("connection lock poisoned"))?;

        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn kind(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
        Ok(conn
            .query_row(
                "SELECT kind FROM store_keys WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Whether `key` holds a value of `kind`. A key of another kind is an
    /// error; a missing key is `false`.
    fn has(conn: &Connection, key: &str, kind: Kind) -> Result<bool, StoreError> {
        match Self::kind(conn, key)? {
            None => Ok(false),
            Some(found) if found == kind.as_str() => Ok(true),
            Some(_) => Err(StoreError::wrong_type(key, kind.as_str())),
        }
    }

    /// Like [`has`](Self::has), registering the key when it is missing.
    fn ensure(conn: &Connection, key: &str, kind: Kind) -> Result<(), StoreError> {
        if !Self::has(conn, key, kind)? {
            Self::register(conn, key, kind)?;
        }
        Ok(())
    }

    fn register(conn: &Connection, key: &str, kind: Kind) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO store_keys (key, kind) VALUES (?1, ?2)",
            params![key, kind.as_str()],
        )?;
        Ok(())
    }

    fn remove_key(conn: &Connection, key: &str) -> Result<(), StoreError> {
        conn.execute("DELETE FROM store_keys WHERE key = ?1", params![key])?;
        for table in VALUE_TABLES {
            conn.execute(&format!("DELETE FROM {} WHERE key = ?1", table), params![key])?;
        }
        Ok(())
    }

    fn rename_key(conn: &Connection, from: &str, to: &str) -> Result<(), StoreError> {
        if Self::kind(conn, from)?.is_none() {
            return Err(StoreError::no_such_key(from));
        }
        if from == to {
            return Ok(());
        }

        Self::remove_key(conn, to)?;
        conn.execute("UPDATE store_keys SET key = ?2 WHERE key = ?1", params![from, to])?;
        for table in VALUE_TABLES {
            conn.execute(
                &format!("UPDATE {} SET key = ?2 WHERE key = ?1", table),
                params![from, to],
            )?;
        }
        Ok(())
    }

    fn members(conn: &Connection, key: &str) -> Result<Vec<EntryId>, StoreError> {
        let mut stmt = conn.prepare("SELECT member FROM store_set_members WHERE key = ?1")?;
        let members = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))?
            .map(|member| member.map(EntryId::from_string))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }

    fn insert_members(conn: &Connection, key: &str, ids: &[EntryId]) -> Result<u64, StoreError> {
        let mut stmt = conn
            .prepare("INSERT OR IGNORE INTO store_set_members (key, member) VALUES (?1, ?2)")?;

        let mut added = 0;
        for id in ids {
            added += stmt.execute(params![key, id.as_str()])? as u64;
        }
        Ok(added)
    }
}

#[async_trait]
impl IdentityStore for SqliteStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.with_tx(|conn| Ok(Self::kind(conn, key)?.is_some()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.with_tx(|conn| Self::remove_key(conn, key))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_tx(|conn| {
            if !Self::has(conn, key, Kind::String)? {
                return Ok(None);
            }
            Ok(conn
                .query_row(
                    "SELECT value FROM store_strings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.with_tx(|conn| {
            Self::remove_key(conn, key)?;
            Self::register(conn, key, Kind::String)?;
            conn.execute(
                "INSERT INTO store_strings (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
    }

    async fn create_set(&self, key: &str) -> Result<(), StoreError> {
        self.with_tx(|conn| {
            Self::remove_key(conn, key)?;
            Self::register(conn, key, Kind::Set)
        })
    }

    async fn set_add(&self, key: &str, ids: &[EntryId]) -> Result<u64, StoreError> {
        self.with_tx(|conn| {
            Self::ensure(conn, key, Kind::Set)?;
            Self::insert_members(conn, key, ids)
        })
    }

    async fn set_card(&self, key: &str) -> Result<u64, StoreError> {
        self.with_tx(|conn| {
            if !Self::has(conn, key, Kind::Set)? {
                return Ok(0);
            }
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM store_set_members WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?)
        })
    }

    async fn set_members(&self, key: &str) -> Result<Vec<EntryId>, StoreError> {
        self.with_tx(|conn| {
            if !Self::has(conn, key, Kind::Set)? {
                return Ok(Vec::new());
            }
            Self::members(conn, key)
        })
    }

    async fn set_pop(&self, key: &str, count: usize) -> Result<Vec<EntryId>, StoreError> {
        let popped = self.with_tx(|conn| {
            if !Self::has(conn, key, Kind::Set)? {
                return Ok(Vec::new());
            }

            let popped: Vec<String> = {
                let mut stmt = conn
                    .prepare("SELECT member FROM store_set_members WHERE key = ?1 LIMIT ?2")?;
                let rows = stmt.query_map(params![key, count as i64], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };

            let mut delete = conn
                .prepare("DELETE FROM store_set_members WHERE key = ?1 AND member = ?2")?;
            for member in &popped {
                delete.execute(params![key, member])?;
            }

            Ok(popped.into_iter().map(EntryId::from_string).collect::<Vec<_>>())
        })?;

        debug!(key = %key, count = popped.len(), "Popped identities");
        Ok(popped)
    }

    async fn diff_store(
        &self,
        destination: &str,
        from: &str,
        minus: &str,
    ) -> Result<u64, StoreError> {
        self.with_tx(|conn| {
            Self::has(conn, from, Kind::Set)?;
            Self::has(conn, minus, Kind::Set)?;

            let difference: Vec<String> = {
                let mut stmt = conn.prepare(
                    "SELECT member FROM store_set_members WHERE key = ?1
                     AND member NOT IN (SELECT member FROM store_set_members WHERE key = ?2)",
                )?;
                let rows = stmt.query_map(params![from, minus], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };

            let difference: Vec<EntryId> =
                difference.into_iter().map(EntryId::from_string).collect();

            Self::remove_key(conn, destination)?;
            Self::register(conn, destination, Kind::Set)?;
            Self::insert_members(conn, destination, &difference)
        })
    }

    async fn map_put(&self, key: &str, entries: &[Entry]) -> Result<(), StoreError> {
        let records = entries
            .iter()
            .map(|entry| Ok((entry.id(), serde_json::to_string(entry)?)))
            .collect::<Result<Vec<_>, serde_json::Error>>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.with_tx(|conn| {
            Self::ensure(conn, key, Kind::Map)?;

            let mut stmt = conn.prepare(
                "INSERT OR REPLACE INTO store_map_entries (key, id, record) VALUES (?1, ?2, ?3)",
            )?;
            for (id, record) in &records {
                stmt.execute(params![key, id.as_str(), record])?;
            }
            Ok(())
        })
    }

    async fn map_get_many(
        &self,
        key: &str,
        ids: &[EntryId],
    ) -> Result<Vec<Option<Entry>>, StoreError> {
        let records: Vec<Option<String>> = self.with_tx(|conn| {
            if !Self::has(conn, key, Kind::Map)? {
                return Ok(vec![None; ids.len()]);
            }

            let mut stmt =
                conn.prepare("SELECT record FROM store_map_entries WHERE key = ?1 AND id = ?2")?;
            let mut records = Vec::with_capacity(ids.len());
            for id in ids {
                records.push(
                    stmt.query_row(params![key, id.as_str()], |row| row.get(0))
                        .optional()?,
                );
            }
            Ok(records)
        })?;

        records
            .into_iter()
            .map(|record| {
                record
                    .map(|json| serde_json::from_str(&json))
                    .transpose()
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect()
    }

    async fn map_remove(&self, key: &str, ids: &[EntryId]) -> Result<(), StoreError> {
        self.with_tx(|conn| {
            if !Self::has(conn, key, Kind::Map)? {
                return Ok(());
            }

            let mut stmt = conn.prepare("DELETE FROM store_map_entries WHERE key = ?1 AND id = ?2")?;
            for id in ids {
                stmt.execute(params![key, id.as_str()])?;
            }
            Ok(())
        })
    }

    async fn map_retain(&self, key: &str, set_key: &str) -> Result<u64, StoreError> {
        self.with_tx(|conn| {
            Self::has(conn, set_key, Kind::Set)?;
            if !Self::has(conn, key, Kind::Map)? {
                return Ok(0);
            }

            let removed = conn.execute(
                "DELETE FROM store_map_entries WHERE key = ?1
                 AND id NOT IN (SELECT member FROM store_set_members WHERE key = ?2)",
                params![key, set_key],
            )?;
            Ok(removed as u64)
        })
    }

    async fn exec(&self, transaction: StoreTransaction) -> Result<(), StoreError> {
        self.with_tx(|conn| {
            for op in transaction.ops() {
                match op {
                    TransactionOp::Rename { from, to } => Self::rename_key(conn, from, to)?,
                    TransactionOp::Delete { key } => Self::remove_key(conn, key)?,
                }
            }
            Ok(())
        })?;

        debug!(ops = transaction.ops().len(), "Executed store transaction");
        Ok(())
    }
}
