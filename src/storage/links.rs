//! Link store for the URL shortener.
//!
//! Links live in a single `links` table:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS "links" (
//!     "id" INTEGER PRIMARY KEY AUTOINCREMENT,
//!     "url" TEXT NOT NULL,
//!     "clicks" INTEGER NOT NULL DEFAULT 0
//! )
//! ```
//!
//! `AUTOINCREMENT` keeps identifiers strictly increasing and never reuses one,
//! even after the newest link has been deleted through the generic API.

use super::sqlite::{ColumnValues, DbManager, Row, TableSchema};
use crate::models::{Link, LinkId};
use crate::{Error, Result};
use rusqlite::types::Value;
use std::path::Path;
use tracing::instrument;

const FIELDS: [&str; 3] = ["id", "url", "clicks"];

/// Click-counting link records on top of a [`DbManager`].
///
/// Like the handle it wraps, the store never commits on its own (apart from
/// creating the table on open): call [`commit`](Self::commit) to make
/// inserts and clicks durable.
///
/// # Examples
///
/// ```
/// use vitedb::LinkStore;
///
/// let store = LinkStore::in_memory()?;
/// let id = store.insert_value("https://example.org/")?;
/// store.increment_clicks(id)?;
///
/// let link = store.get_value(id)?;
/// assert_eq!((link.url.as_str(), link.clicks), ("https://example.org/", 1));
/// # Ok::<(), vitedb::Error>(())
/// ```
#[derive(Debug)]
pub struct LinkStore {
    db: DbManager,
}

impl LinkStore {
    /// Table holding the links.
    pub const TABLE_NAME: &'static str = "links";

    /// Column names of the `links` table, in declaration order.
    #[must_use]
    pub const fn fields() -> &'static [&'static str] {
        &FIELDS
    }

    /// Table descriptor for the `links` table.
    #[must_use]
    pub fn schema() -> TableSchema {
        TableSchema::new(Self::TABLE_NAME)
            .column("id", "INTEGER PRIMARY KEY AUTOINCREMENT")
            .column("url", "TEXT NOT NULL")
            .column("clicks", "INTEGER NOT NULL DEFAULT 0")
    }

    /// Opens the database at `path` and makes sure the `links` table exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the file cannot be opened, or
    /// [`Error::Schema`] if a `links` table with a different layout exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_manager(DbManager::open(path)?)
    }

    /// Opens the existing database at `path` without creating the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the file does not exist or cannot be
    /// opened, or [`Error::Schema`] on a conflicting `links` table.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_manager(DbManager::open_existing(path)?)
    }

    /// Opens a link store on a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        Self::with_manager(DbManager::in_memory()?)
    }

    /// Wraps an open handle, creating the `links` table and committing.
    ///
    /// Anything pending on `db` is committed along with the table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] on a conflicting `links` table, or the commit
    /// error.
    pub fn with_manager(db: DbManager) -> Result<Self> {
        db.create_table(&Self::schema())?;
        db.commit()?;
        Ok(Self { db })
    }

    /// Opens the store at `path`, runs `f`, and closes it on every exit path.
    ///
    /// Changes `f` did not commit are discarded.
    ///
    /// # Errors
    ///
    /// Returns the error from opening, from `f`, or from closing.
    pub fn scoped<T, F>(path: impl AsRef<Path>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        Self::open(path)?.run_scoped(f)
    }

    /// Like [`scoped`](Self::scoped), but fails instead of creating a
    /// missing database file.
    ///
    /// # Errors
    ///
    /// Returns the error from opening, from `f`, or from closing.
    pub fn scoped_existing<T, F>(path: impl AsRef<Path>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        Self::open_existing(path)?.run_scoped(f)
    }

    fn run_scoped<T, F>(mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let outcome = f(&mut self);
        let closed = self.close();
        let value = outcome?;
        closed?;
        Ok(value)
    }

    /// Stores a new link with zero clicks and returns its identifier.
    ///
    /// The URL is stored exactly as given; no validation or normalization
    /// takes place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the store is closed.
    #[instrument(skip(self, url), fields(operation = "insert_value", url_len = url.len()))]
    pub fn insert_value(&self, url: &str) -> Result<LinkId> {
        let values = ColumnValues::new()
            .with("url", url.to_string())
            .with("clicks", 0_i64);
        let id = LinkId::new(self.db.insert(Self::TABLE_NAME, &values)?);
        tracing::debug!(%id, "link stored");
        Ok(id)
    }

    /// Fetches the link stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no link has that identifier.
    #[instrument(skip(self), fields(operation = "get_value", id = %id))]
    pub fn get_value(&self, id: LinkId) -> Result<Link> {
        let rows = self
            .db
            .select(Self::TABLE_NAME, &FIELDS, &id_filter(id))?;
        let row = rows.into_iter().next().ok_or_else(|| not_found(id))?;
        link_from_row(row)
    }

    /// Adds one click to the link stored under `id`.
    ///
    /// The addition happens in a single `UPDATE`, so concurrent clicks from
    /// separate handles are never lost. A counter at `i64::MAX` is left
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no link has that identifier, or
    /// [`Error::Constraint`] if the counter would overflow.
    #[instrument(skip(self), fields(operation = "increment_clicks", id = %id))]
    pub fn increment_clicks(&self, id: LinkId) -> Result<()> {
        let changed = self
            .db
            .increment(Self::TABLE_NAME, "clicks", 1, &id_filter(id))?;
        if changed > 0 {
            return Ok(());
        }
        // The guarded UPDATE matches nothing for a missing row or a full counter.
        self.get_value(id)?;
        Err(Error::Constraint {
            operation: "increment_clicks".to_string(),
            cause: format!("click counter overflow for link {id}"),
        })
    }

    /// Records a click and returns the updated link: the redirect path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no link has that identifier.
    pub fn resolve(&self, id: LinkId) -> Result<Link> {
        self.increment_clicks(id)?;
        self.get_value(id)
    }

    /// Number of stored links.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the store is closed.
    pub fn count(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", Self::TABLE_NAME);
        let rows = self.db.query(&sql, &[])?;
        match rows.first().and_then(|row| row.first()) {
            Some(Value::Integer(n)) => u64::try_from(*n).map_err(|e| Error::OperationFailed {
                operation: "count".to_string(),
                cause: e.to_string(),
            }),
            other => Err(Error::OperationFailed {
                operation: "count".to_string(),
                cause: format!("unexpected count result: {other:?}"),
            }),
        }
    }

    /// The underlying handle, for generic table operations.
    #[must_use]
    pub const fn db(&self) -> &DbManager {
        &self.db
    }

    /// Commits pending inserts and clicks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transaction`] if nothing is pending or the store is
    /// closed.
    pub fn commit(&self) -> Result<()> {
        self.db.commit()
    }

    /// Discards pending inserts and clicks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transaction`] if nothing is pending or the store is
    /// closed.
    pub fn rollback(&self) -> Result<()> {
        self.db.rollback()
    }

    /// Closes the store, discarding anything uncommitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the connection cannot be released.
    pub fn close(&mut self) -> Result<()> {
        self.db.close()
    }
}

fn id_filter(id: LinkId) -> ColumnValues {
    ColumnValues::new().with("id", id.as_i64())
}

fn not_found(id: LinkId) -> Error {
    Error::NotFound {
        entity: "link",
        id: id.to_string(),
    }
}

fn link_from_row(row: Row) -> Result<Link> {
    match <[Value; 3]>::try_from(row) {
        Ok([Value::Integer(id), Value::Text(url), Value::Integer(clicks)]) => Ok(Link {
            id: LinkId::new(id),
            url,
            clicks,
        }),
        other => Err(Error::OperationFailed {
            operation: "get_value".to_string(),
            cause: format!("malformed links row: {other:?}"),
        }),
    }
}
