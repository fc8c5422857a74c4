//! Connection lifecycle and transactions.
//!
//! A [`DbManager`] owns exactly one `SQLite` connection. It is opened on
//! construction and closed when [`DbManager::close`] is called or the value is
//! dropped, whichever happens first. Transactions are explicit and flat:
//! the first write after open, commit or rollback begins one, and only
//! [`DbManager::commit`] makes its changes durable. Reads outside a pending
//! transaction run in autocommit mode, so a long-lived handle always sees
//! what other handles have committed.

use crate::{Error, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Busy timeout applied to every connection, in milliseconds.
pub const BUSY_TIMEOUT_MS: u32 = 5000;

/// Configures a `SQLite` connection.
///
/// # Configuration Applied
///
/// - **WAL mode**: readers in other connections keep working while a write
///   transaction is open (in-memory databases report `memory` instead)
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits up to [`BUSY_TIMEOUT_MS`] for locks instead of
///   failing immediately
/// - **`foreign_keys`**: enforced
///
/// # Errors
///
/// Returns [`Error::Connection`] if a pragma cannot be applied.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode answers with the resulting mode; in-memory databases keep
    // "memory", which is fine.
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
        .map_err(|e| Error::Connection(format!("configure journal_mode: {e}")))?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(|e| Error::Connection(format!("configure synchronous: {e}")))?;
    conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)
        .map_err(|e| Error::Connection(format!("configure busy_timeout: {e}")))?;
    conn.pragma_update(None, "foreign_keys", true)
        .map_err(|e| Error::Connection(format!("configure foreign_keys: {e}")))?;
    Ok(())
}

/// Handle on one open database connection.
///
/// # State
///
/// `OPEN` from construction until [`close`](Self::close); `CLOSED` afterwards,
/// for good. A closed handle rejects table operations with
/// [`Error::Connection`] and commit/rollback with [`Error::Transaction`].
///
/// # Concurrency Model
///
/// The handle is `Send` but not `Sync`: one handle serves one thread at a
/// time. Use one handle per worker, or wrap it in a mutex.
pub struct DbManager {
    /// `None` once closed.
    conn: Option<Connection>,
    /// Path of the database file (None for in-memory).
    db_path: Option<PathBuf>,
}

impl DbManager {
    /// Opens (or creates) the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the file cannot be opened or created,
    /// or the connection cannot be configured.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vitedb::DbManager;
    ///
    /// let db = DbManager::open("links.db")?;
    /// assert!(db.is_open());
    /// # Ok::<(), vitedb::Error>(())
    /// ```
    #[instrument(skip(path), fields(operation = "open", backend = "sqlite", path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::Connection(format!("open {}: {e}", db_path.display())))?;
        configure_connection(&conn)?;
        tracing::debug!("database opened");

        Ok(Self {
            conn: Some(conn),
            db_path: Some(db_path),
        })
    }

    /// Opens the database file at `path`, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the file is missing or cannot be
    /// opened, or the connection cannot be configured.
    #[instrument(skip(path), fields(operation = "open_existing", backend = "sqlite", path = %path.as_ref().display()))]
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)
            .map_err(|e| Error::Connection(format!("open {}: {e}", db_path.display())))?;
        configure_connection(&conn)?;
        tracing::debug!("existing database opened");

        Ok(Self {
            conn: Some(conn),
            db_path: Some(db_path),
        })
    }

    /// Opens a private in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Connection(format!("open in-memory database: {e}")))?;
        configure_connection(&conn)?;

        Ok(Self {
            conn: Some(conn),
            db_path: None,
        })
    }

    /// Opens `path`, runs `f`, and closes the handle on every exit path.
    ///
    /// Changes `f` did not commit are discarded. If both `f` and the close
    /// fail, the error from `f` is returned.
    ///
    /// # Errors
    ///
    /// Returns the error from opening, from `f`, or from closing.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vitedb::{ColumnValues, DbManager, TableSchema};
    ///
    /// DbManager::scoped("app.db", |db| {
    ///     db.create_table(&TableSchema::new("notes").column("body", "TEXT"))?;
    ///     db.insert("notes", &ColumnValues::new().with("body", "hello".to_string()))?;
    ///     db.commit()
    /// })?;
    /// # Ok::<(), vitedb::Error>(())
    /// ```
    pub fn scoped<T, F>(path: impl AsRef<Path>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let mut db = Self::open(path)?;
        let outcome = f(&mut db);
        let closed = db.close();
        let value = outcome?;
        closed?;
        Ok(value)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Returns true until the handle is closed.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Returns true while a transaction is pending.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|conn| !conn.is_autocommit())
    }

    /// Commits every change made since the last commit or rollback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transaction`] if the handle is closed, no transaction
    /// is active, or the store rejects the commit.
    #[instrument(skip(self), fields(operation = "commit", backend = "sqlite"))]
    pub fn commit(&self) -> Result<()> {
        let conn = self.active_transaction("commit")?;
        conn.execute_batch("COMMIT")
            .map_err(|e| Error::Transaction(format!("commit: {e}")))
    }

    /// Discards every change made since the last commit or rollback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transaction`] if the handle is closed, no transaction
    /// is active, or the store rejects the rollback.
    #[instrument(skip(self), fields(operation = "rollback", backend = "sqlite"))]
    pub fn rollback(&self) -> Result<()> {
        let conn = self.active_transaction("rollback")?;
        conn.execute_batch("ROLLBACK")
            .map_err(|e| Error::Transaction(format!("rollback: {e}")))
    }

    /// Closes the connection, discarding uncommitted changes.
    ///
    /// Safe to call any number of times; only the first call does anything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if `SQLite` refuses to release the
    /// connection. The handle counts as closed either way.
    #[instrument(skip(self), fields(operation = "close", backend = "sqlite"))]
    pub fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        if !conn.is_autocommit() {
            tracing::debug!("discarding uncommitted changes on close");
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "rollback on close failed");
            }
        }

        conn.close()
            .map_err(|(_, e)| Error::Connection(format!("close: {e}")))
    }

    /// Returns the open connection without touching transaction state.
    ///
    /// Reads join a pending transaction; otherwise they run in autocommit.
    pub(crate) fn read_conn(&self, operation: &str) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::Connection(format!("{operation}: connection is closed")))
    }

    /// Returns the open connection with a transaction in progress, beginning
    /// one if needed. Used by writes.
    pub(crate) fn transaction_conn(&self, operation: &str) -> Result<&Connection> {
        let conn = self.read_conn(operation)?;
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN DEFERRED")
                .map_err(|e| Error::Transaction(format!("begin ({operation}): {e}")))?;
        }
        Ok(conn)
    }

    fn active_transaction(&self, operation: &str) -> Result<&Connection> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| Error::Transaction(format!("{operation}: connection is closed")))?;
        if conn.is_autocommit() {
            return Err(Error::Transaction(format!(
                "{operation}: no active transaction"
            )));
        }
        Ok(conn)
    }
}

impl Drop for DbManager {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close database on drop");
        }
    }
}

impl std::fmt::Debug for DbManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbManager")
            .field("db_path", &self.db_path)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_configure_connection() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        // In-memory SQLite databases cannot use WAL mode - they report "memory"
        assert!(
            journal_mode.eq_ignore_ascii_case("wal") || journal_mode.eq_ignore_ascii_case("memory"),
            "Expected 'wal' or 'memory' journal mode, got '{journal_mode}'"
        );

        let synchronous: i32 = conn
            .pragma_query_value(None, "synchronous", |row| row.get(0))
            .unwrap();
        assert_eq!(synchronous, 1, "Expected NORMAL synchronous mode (1)");

        let busy_timeout: i32 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, 5000);
    }

    #[test]
    fn test_open_file_uses_wal() {
        let dir = TempDir::new().unwrap();
        let db = DbManager::open(dir.path().join("test.db")).unwrap();

        let conn = db.conn.as_ref().unwrap();
        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");
        assert_eq!(db.db_path(), Some(&dir.path().join("test.db")));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let result = DbManager::open(dir.path().join("missing").join("test.db"));
        assert!(matches!(result, Err(Error::Connection(_))));
    }

    #[test]
    fn test_in_memory_has_no_path() {
        let db = DbManager::in_memory().unwrap();
        assert!(db.db_path().is_none());
        assert!(db.is_open());
    }

    #[test]
    fn test_commit_without_transaction_fails() {
        let db = DbManager::in_memory().unwrap();
        let result = db.commit();
        assert!(
            matches!(result, Err(Error::Transaction(ref msg)) if msg.contains("no active transaction"))
        );
        assert!(matches!(db.rollback(), Err(Error::Transaction(_))));
    }

    #[test]
    fn test_transaction_begins_lazily() {
        let db = DbManager::in_memory().unwrap();
        assert!(!db.in_transaction());

        db.transaction_conn("test").unwrap();
        assert!(db.in_transaction());

        db.commit().unwrap();
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_read_conn_does_not_begin() {
        let db = DbManager::in_memory().unwrap();
        db.read_conn("select").unwrap();
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_open_existing_requires_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.db");

        let result = DbManager::open_existing(&path);
        assert!(matches!(result, Err(Error::Connection(_))));
        assert!(!path.exists());

        drop(DbManager::open(&path).unwrap());
        assert!(DbManager::open_existing(&path).unwrap().is_open());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut db = DbManager::in_memory().unwrap();
        db.close().unwrap();
        db.close().unwrap();
        assert!(!db.is_open());
    }

    #[test]
    fn test_closed_handle_is_terminal() {
        let mut db = DbManager::in_memory().unwrap();
        db.close().unwrap();

        assert!(matches!(
            db.transaction_conn("insert"),
            Err(Error::Connection(_))
        ));
        assert!(matches!(db.commit(), Err(Error::Transaction(_))));
        assert!(matches!(db.rollback(), Err(Error::Transaction(_))));
    }

    #[test]
    fn test_close_discards_pending_transaction() {
        let mut db = DbManager::in_memory().unwrap();
        db.transaction_conn("test").unwrap();
        assert!(db.in_transaction());

        db.close().unwrap();
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_scoped_closes_after_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scoped.db");

        let result: Result<()> = DbManager::scoped(&path, |db| {
            db.transaction_conn("test")?;
            Err(Error::InvalidInput("boom".to_string()))
        });
        assert!(matches!(result, Err(Error::InvalidInput(ref msg)) if msg == "boom"));

        // The file is free again: a new scope can write and commit.
        DbManager::scoped(&path, |db| {
            db.transaction_conn("test")?;
            db.commit()
        })
        .unwrap();
    }
}
