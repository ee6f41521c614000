//! SQLite-backed store.
//!
//! One table, one row per entity:
//!
//! ```sql
//! CREATE TABLE entities (
//!     id    INTEGER PRIMARY KEY AUTOINCREMENT,
//!     key   TEXT NOT NULL UNIQUE,
//!     value TEXT
//! );
//! ```
//!
//! Transactions map onto `BEGIN IMMEDIATE` / `COMMIT` / `ROLLBACK` on the
//! single connection. Statements execute immediately, so `save_changes` has
//! nothing to flush.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use flatstruct_core_store::{Entity, Store, StoreError};
use rusqlite::{params, Connection, OptionalExtension};

/// A [`Store`] persisted in a SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    in_transaction: bool,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(StoreError::backend)?;
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Self::with_connection(conn)
    }

    /// Opens a store that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::backend)?;
        Self::with_connection(conn)
    }

    /// Wrap an existing connection, creating the table if needed.
    pub fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                value TEXT
            );
            ",
        )
        .map_err(StoreError::backend)?;

        Ok(Self {
            conn: Mutex::new(conn),
            in_transaction: false,
        })
    }

    /// Number of stored entities.
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))
            .map_err(StoreError::backend)?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn row_to_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entity> {
        Ok(Entity {
            id: row.get(0)?,
            key: row.get(1)?,
            value: row.get(2)?,
        })
    }
}

impl Store for SqliteStore {
    fn get_entity(&self, key: &str) -> Result<Option<Entity>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, key, value FROM entities WHERE key = ?1",
            params![key],
            Self::row_to_entity,
        )
        .optional()
        .map_err(StoreError::backend)
    }

    fn get_entities(&self, prefix: &str) -> Result<Vec<Entity>, StoreError> {
        let conn = self.lock()?;
        // substr() counts characters for TEXT, so compare on a character length.
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, key, value FROM entities
                 WHERE substr(key, 1, ?1) = ?2
                 ORDER BY key",
            )
            .map_err(StoreError::backend)?;
        let len = i64::try_from(prefix.chars().count()).map_err(StoreError::backend)?;
        let rows = stmt
            .query_map(params![len, prefix], Self::row_to_entity)
            .map_err(StoreError::backend)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::backend)
    }

    fn upsert_entity(&mut self, entity: Entity) -> Result<(), StoreError> {
        tracing::trace!(key = %entity.key, "upsert");
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO entities (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![entity.key, entity.value],
        )
        .map_err(StoreError::backend)?;
        Ok(())
    }

    fn delete_entity(&mut self, entity: &Entity) -> Result<bool, StoreError> {
        tracing::trace!(key = %entity.key, "delete");
        let conn = self.lock()?;
        let changed = match entity.id {
            Some(id) => conn.execute("DELETE FROM entities WHERE id = ?1", params![id]),
            None => conn.execute("DELETE FROM entities WHERE key = ?1", params![entity.key]),
        }
        .map_err(StoreError::backend)?;
        Ok(changed > 0)
    }

    fn begin_transaction(&mut self) -> Result<(), StoreError> {
        if self.in_transaction {
            return Err(StoreError::TransactionActive);
        }
        self.lock()?
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(StoreError::backend)?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), StoreError> {
        if !self.in_transaction {
            return Err(StoreError::NoTransaction);
        }
        self.lock()?
            .execute_batch("COMMIT")
            .map_err(StoreError::backend)?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<(), StoreError> {
        if !self.in_transaction {
            return Err(StoreError::NoTransaction);
        }
        self.in_transaction = false;
        self.lock()?
            .execute_batch("ROLLBACK")
            .map_err(StoreError::backend)
    }

    fn save_changes(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
