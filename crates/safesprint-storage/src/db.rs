//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex for thread-safe access.
//! Configures WAL mode and recommended PRAGMAs on initialization.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, Transaction};
use tracing::info;

use safesprint_core::error::SafeSprintError;

use crate::feed::ChangeFeed;
use crate::migrations;

/// Thread-safe SQLite database wrapper.
///
/// Uses WAL mode for concurrent read/write safety. The connection is
/// wrapped in a Mutex since rusqlite Connection is not Sync. Every
/// repository built on the same `Database` publishes to the same
/// [`ChangeFeed`].
pub struct Database {
    conn: Mutex<Connection>,
    changes: ChangeFeed,
}

impl Database {
    /// Open (or create) a database at the given path.
    ///
    /// Configures WAL mode, synchronous=NORMAL, foreign keys, and runs
    /// all pending migrations.
    pub fn new(path: &Path) -> Result<Self, SafeSprintError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| SafeSprintError::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| SafeSprintError::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, SafeSprintError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            SafeSprintError::Storage(format!("Failed to open in-memory db: {}", e))
        })?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| SafeSprintError::Storage(format!("Failed to set pragmas: {}", e)))?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, SafeSprintError> {
        let db = Self {
            conn: Mutex::new(conn),
            changes: ChangeFeed::new(),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure, so keep it free of
    /// anything that waits on the network.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, SafeSprintError>
    where
        F: FnOnce(&Connection) -> Result<T, SafeSprintError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SafeSprintError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a closure inside a transaction. Commits when the closure
    /// returns `Ok`, rolls back otherwise.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, SafeSprintError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, SafeSprintError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| SafeSprintError::Storage(format!("Database lock poisoned: {}", e)))?;
        let tx = conn
            .transaction()
            .map_err(|e| SafeSprintError::Storage(format!("Failed to begin transaction: {}", e)))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| SafeSprintError::Storage(format!("Failed to commit: {}", e)))?;
        Ok(value)
    }

    /// Change notifications for rows written through this database.
    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_sessions(db: &Database) -> i64 {
        db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
                .map_err(|e| SafeSprintError::Storage(e.to_string()))
        })
        .unwrap()
    }

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        assert_eq!(count_sessions(&db), 0);
    }

    #[test]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let db = Database::new(&path).unwrap();

        assert_eq!(count_sessions(&db), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("wal.db")).unwrap();
        db.with_conn(|conn| {
            let mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .map_err(|e| SafeSprintError::Storage(e.to_string()))?;
            assert_eq!(mode, "wal");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();
        let result: Result<(), SafeSprintError> = db.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO sessions (id, name, context, leader_credential, created_at)
                 VALUES ('s1', 'n', 'c', 'k', 0)",
                [],
            )
            .map_err(|e| SafeSprintError::Storage(e.to_string()))?;
            Err(SafeSprintError::Storage("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(count_sessions(&db), 0);
    }
}
