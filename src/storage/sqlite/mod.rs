//! `SQLite` data access.
//!
//! [`DbManager`] wraps a single connection and exposes generic table
//! operations on top of it. Everything that reaches the store goes through
//! parameter binding; identifiers are validated and quoted.
//!
//! ## Module Structure
//!
//! - [`connection`]: connection lifecycle, pragmas and transactions
//! - [`sql`]: statement builders, identifier validation and binding types
//! - `table`: generic table operations on [`DbManager`]
//! - [`metrics`]: operation metrics helpers
//!
//! ## Transactions
//!
//! The first write after open, commit or rollback begins a transaction; reads
//! outside one run in autocommit.
//! Nothing is durable until [`DbManager::commit`]; closing or dropping the
//! handle discards pending changes.

pub mod connection;
pub mod metrics;
pub mod sql;
mod table;

pub use connection::{BUSY_TIMEOUT_MS, DbManager, configure_connection};
pub use metrics::{record_operation_metrics, status_label};
pub use sql::{
    BoundStatement, ColumnValues, TableSchema, build_create_table, build_delete,
    build_increment, build_insert, build_select, build_update, quote_identifier,
    validate_identifier, validate_type_declaration,
};
pub use table::Row;
