//! # vitedb
//!
//! A small data-access layer over an embedded `SQLite` store, and the
//! click-counting link store of a URL shortener built on top of it.
//!
//! ## Layers
//!
//! - [`storage::DbManager`]: owns one connection, drives explicit
//!   transactions and builds parameterized statements for generic table
//!   operations (create, list, insert, update, select, delete).
//! - [`storage::LinkStore`]: the `links` table (`id`, `url`, `clicks`) and its
//!   domain operations.
//! - [`config`] and [`observability`]: process-level configuration and logging
//!   used by the `vitedb` binary.
//!
//! ## Example
//!
//! ```rust,no_run
//! use vitedb::storage::LinkStore;
//!
//! let id = LinkStore::scoped("links.db", |links| {
//!     let id = links.insert_value("https://example.org/")?;
//!     links.increment_clicks(id)?;
//!     links.commit()?;
//!     Ok(id)
//! })?;
//! println!("stored as {}", id.to_short_code());
//! # Ok::<(), vitedb::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod models;
pub mod observability;
pub mod storage;

pub use config::VitedbConfig;
pub use models::{Link, LinkId};
pub use storage::{ColumnValues, DbManager, LinkStore, Row, TableSchema};

/// Error type for vitedb operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Connection` | The database cannot be opened or closed, or the handle is already closed |
/// | `Transaction` | Commit/rollback without an active transaction, or the store rejects it |
/// | `Schema` | Conflicting table definition, unknown table or column |
/// | `Constraint` | An insert or update violates a store constraint |
/// | `InvalidInput` | Empty column lists, length mismatches, malformed identifiers |
/// | `NotFound` | Lookup by identifier with no matching record |
/// | `OperationFailed` | Any other store, filesystem or configuration failure |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The store could not be opened or closed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A transaction could not be committed or rolled back.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A table definition conflicts with the existing schema.
    #[error("schema error during '{operation}': {cause}")]
    Schema {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A store constraint was violated.
    #[error("constraint violated during '{operation}': {cause}")]
    Constraint {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The call itself was malformed.
    ///
    /// Raised before any SQL is built, e.g. for empty column lists, column and
    /// value sequences of different lengths, or names that are not plain
    /// identifiers.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No record exists for the requested identifier.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// The identifier that had no match.
        id: String,
    },

    /// An operation failed for a reason outside the categories above.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Classifies a `rusqlite` failure raised while running `operation`.
    ///
    /// The extended `SQLite` result code decides the variant when it is
    /// specific enough; generic `SQLITE_ERROR` results are told apart by their
    /// message.
    pub(crate) fn from_sqlite(operation: &str, err: &rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        let cause = err.to_string();
        match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation | ErrorCode::TypeMismatch) => Self::Constraint {
                operation: operation.to_string(),
                cause,
            },
            Some(ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::PermissionDenied) => {
                Self::Connection(format!("{operation}: {cause}"))
            },
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::Transaction(format!("{operation}: {cause}"))
            },
            _ if is_schema_message(&cause) => Self::Schema {
                operation: operation.to_string(),
                cause,
            },
            _ => Self::OperationFailed {
                operation: operation.to_string(),
                cause,
            },
        }
    }

    /// Returns true for [`Error::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn is_schema_message(message: &str) -> bool {
    const MARKERS: [&str; 5] = [
        "no such table",
        "no such column",
        "already exists",
        "has no column named",
        "reserved for internal use",
    ];
    MARKERS.iter().any(|marker| message.contains(marker))
}

/// Result type alias for vitedb operations.
pub type Result<T> = std::result::Result<T, Error>;
