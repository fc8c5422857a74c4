//! Generic table operations on an open [`DbManager`].
//!
//! Writes run inside the handle's current transaction (beginning one if none
//! is active) and never commit. Reads join a pending transaction and
//! otherwise run in autocommit, so they never leave a snapshot open.
//! Results come back as values: rows for selects, the assigned row id for
//! inserts, and affected-row counts for updates and deletes.

use super::connection::DbManager;
use super::metrics::{record_operation_metrics, status_label};
use super::sql::{
    BoundStatement, ColumnValues, TableSchema, build_create_table, build_delete,
    build_increment, build_insert, build_select, build_update, quote_identifier,
};
use crate::{Error, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use std::time::Instant;
use tracing::instrument;

/// One result row, in the statement's column order.
pub type Row = Vec<Value>;

impl DbManager {
    /// Creates a table if it does not exist yet.
    ///
    /// Calling this again with the same column names is a no-op. If the table
    /// exists with a different ordered list of column names the call fails,
    /// since `CREATE TABLE IF NOT EXISTS` alone would silently keep the old
    /// layout.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for a schema without columns or with invalid
    ///   names or type declarations
    /// - [`Error::Schema`] if the existing table has different columns
    #[instrument(skip(self, schema), fields(operation = "create_table", backend = "sqlite", table = %schema.name()))]
    pub fn create_table(&self, schema: &TableSchema) -> Result<()> {
        observed("create_table", || {
            let sql = build_create_table(schema)?;
            let conn = self.transaction_conn("create_table")?;

            let existing = table_columns(conn, schema.name())?;
            if !existing.is_empty() {
                let same_layout = existing.len() == schema.columns().len()
                    && existing
                        .iter()
                        .zip(schema.column_names())
                        .all(|(have, want)| have.eq_ignore_ascii_case(want));
                if !same_layout {
                    return Err(Error::Schema {
                        operation: "create_table".to_string(),
                        cause: format!(
                            "table '{}' already exists with columns ({})",
                            schema.name(),
                            existing.join(", ")
                        ),
                    });
                }
            }

            conn.execute(&sql, [])
                .map_err(|e| Error::from_sqlite("create_table", &e))?;
            Ok(())
        })
    }

    /// Lists user tables, sorted by name.
    ///
    /// `SQLite`'s own bookkeeping tables (`sqlite_sequence`, ...) are left out.
    #[instrument(skip(self), fields(operation = "list_tables", backend = "sqlite"))]
    pub fn list_tables(&self) -> Result<Vec<String>> {
        observed("list_tables", || {
            let rows = self.query_rows(
                "list_tables",
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
                 ORDER BY name",
                &[],
            )?;
            Ok(rows
                .into_iter()
                .filter_map(|row| match row.into_iter().next() {
                    Some(Value::Text(name)) => Some(name),
                    _ => None,
                })
                .collect())
        })
    }

    /// Inserts one row and returns the row id `SQLite` assigned to it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for empty bindings or invalid names
    /// - [`Error::Constraint`] if the row violates a constraint
    /// - [`Error::Schema`] if the table or a column does not exist
    #[instrument(skip(self, values), fields(operation = "insert", backend = "sqlite", table = table, columns = values.len()))]
    pub fn insert(&self, table: &str, values: &ColumnValues) -> Result<i64> {
        observed("insert", || {
            let stmt = build_insert(table, values)?;
            let conn = self.transaction_conn("insert")?;
            run_bound(conn, "insert", &stmt)?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Updates every row matching `filter` and returns how many matched.
    ///
    /// Zero matches is not an error.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for empty assignments or filter, or invalid names
    /// - [`Error::Constraint`] if an updated row violates a constraint
    #[instrument(skip(self, set, filter), fields(operation = "update", backend = "sqlite", table = table))]
    pub fn update(&self, table: &str, set: &ColumnValues, filter: &ColumnValues) -> Result<usize> {
        observed("update", || {
            let stmt = build_update(table, set, filter)?;
            let conn = self.transaction_conn("update")?;
            run_bound(conn, "update", &stmt)
        })
    }

    /// Returns `columns` of every row matching `filter`, in row id order.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an empty column list or filter, or
    ///   invalid names
    /// - [`Error::Schema`] if the table or a column does not exist
    #[instrument(skip(self, columns, filter), fields(operation = "select", backend = "sqlite", table = table))]
    pub fn select<C: AsRef<str>>(
        &self,
        table: &str,
        columns: &[C],
        filter: &ColumnValues,
    ) -> Result<Vec<Row>> {
        observed("select", || {
            let stmt = build_select(table, columns, filter)?;
            self.query_rows("select", &stmt.sql, &stmt.params)
        })
    }

    /// Returns every column of every row, in row id order.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an invalid table name
    /// - [`Error::Schema`] if the table does not exist
    #[instrument(skip(self), fields(operation = "select_all", backend = "sqlite", table = table))]
    pub fn select_all(&self, table: &str) -> Result<Vec<Row>> {
        observed("select_all", || {
            let sql = format!("SELECT * FROM {} ORDER BY rowid", quote_identifier(table)?);
            self.query_rows("select_all", &sql, &[])
        })
    }

    /// Deletes every row matching `filter` and returns how many were removed.
    ///
    /// Zero matches is not an error.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an empty filter or invalid names
    #[instrument(skip(self, filter), fields(operation = "delete", backend = "sqlite", table = table))]
    pub fn delete(&self, table: &str, filter: &ColumnValues) -> Result<usize> {
        observed("delete", || {
            let stmt = build_delete(table, filter)?;
            let conn = self.transaction_conn("delete")?;
            run_bound(conn, "delete", &stmt)
        })
    }

    /// Adds `delta` to `column` of every row matching `filter`, in a single
    /// statement, and returns how many rows changed.
    ///
    /// Rows whose value would leave the `i64` range are skipped and keep
    /// their value.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an empty filter or invalid names
    /// - [`Error::Constraint`] if the new value violates a constraint
    #[instrument(skip(self, filter), fields(operation = "increment", backend = "sqlite", table = table, column = column))]
    pub fn increment(
        &self,
        table: &str,
        column: &str,
        delta: i64,
        filter: &ColumnValues,
    ) -> Result<usize> {
        observed("increment", || {
            let stmt = build_increment(table, column, delta, filter)?;
            let conn = self.transaction_conn("increment")?;
            run_bound(conn, "increment", &stmt)
        })
    }

    /// Runs one statement with bound parameters and returns the number of
    /// changed rows.
    ///
    /// For administration; the table operations above cover regular use.
    ///
    /// # Errors
    ///
    /// Returns the classified `SQLite` error if the statement fails.
    #[instrument(skip(self, params), fields(operation = "execute", backend = "sqlite"))]
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        observed("execute", || {
            let conn = self.transaction_conn("execute")?;
            conn.execute(sql, params_from_iter(params))
                .map_err(|e| Error::from_sqlite("execute", &e))
        })
    }

    /// Runs one query with bound parameters and returns all rows.
    ///
    /// Like the other reads it begins no transaction; statements that change
    /// data belong in [`execute`](Self::execute).
    ///
    /// # Errors
    ///
    /// Returns the classified `SQLite` error if the query fails.
    #[instrument(skip(self, params), fields(operation = "query", backend = "sqlite"))]
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        observed("query", || self.query_rows("query", sql, params))
    }

    fn query_rows(&self, operation: &str, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let conn = self.read_conn(operation)?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::from_sqlite(operation, &e))?;
        let width = stmt.column_count();

        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Row>>()
            })
            .map_err(|e| Error::from_sqlite(operation, &e))?;

        rows.collect::<rusqlite::Result<Vec<Row>>>()
            .map_err(|e| Error::from_sqlite(operation, &e))
    }
}

/// Times `f` and records it under `operation`.
fn observed<T>(operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let result = f();
    record_operation_metrics(operation, start, status_label(&result));
    if let Err(ref e) = result {
        tracing::debug!(error = %e, "{operation} failed");
    }
    result
}

fn run_bound(conn: &Connection, operation: &str, stmt: &BoundStatement) -> Result<usize> {
    conn.execute(&stmt.sql, params_from_iter(&stmt.params))
        .map_err(|e| Error::from_sqlite(operation, &e))
}

/// Column names of `table`, empty if it does not exist.
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut columns = Vec::new();
    conn.pragma(None, "table_info", table, |row| {
        columns.push(row.get::<_, String>(1)?);
        Ok(())
    })
    .map_err(|e| Error::from_sqlite("table_info", &e))?;
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_schema() -> TableSchema {
        TableSchema::new("test")
            .column("id", "INTEGER")
            .column("name", "TEXT")
    }

    fn seeded() -> DbManager {
        let db = DbManager::in_memory().unwrap();
        db.create_table(&test_schema()).unwrap();
        db.insert(
            "test",
            &ColumnValues::new()
                .with("id", 1_i64)
                .with("name", "test".to_string()),
        )
        .unwrap();
        db
    }

    fn row(id: i64, name: &str) -> Row {
        vec![Value::Integer(id), Value::Text(name.to_string())]
    }

    #[test]
    fn test_list_tables_empty() {
        let db = DbManager::in_memory().unwrap();
        assert!(db.list_tables().unwrap().is_empty());
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let db = DbManager::in_memory().unwrap();
        db.create_table(&test_schema()).unwrap();
        db.create_table(&test_schema()).unwrap();

        assert_eq!(db.list_tables().unwrap(), ["test"]);
    }

    #[test]
    fn test_create_table_conflicting_schema() {
        let db = DbManager::in_memory().unwrap();
        db.create_table(&test_schema()).unwrap();

        let other = TableSchema::new("test").column("id", "INTEGER");
        let result = db.create_table(&other);
        assert!(matches!(result, Err(Error::Schema { ref cause, .. }) if cause.contains("id, name")));
    }

    #[test]
    fn test_list_tables_hides_sqlite_internals() {
        let db = DbManager::in_memory().unwrap();
        db.create_table(
            &TableSchema::new("counters")
                .column("id", "INTEGER PRIMARY KEY AUTOINCREMENT")
                .column("n", "INTEGER"),
        )
        .unwrap();
        db.insert("counters", &ColumnValues::new().with("n", 0_i64))
            .unwrap();

        assert_eq!(db.list_tables().unwrap(), ["counters"]);
    }

    #[test]
    fn test_insert_returns_rowid() {
        let db = DbManager::in_memory().unwrap();
        db.create_table(&test_schema()).unwrap();

        let first = db
            .insert("test", &ColumnValues::new().with("name", "a".to_string()))
            .unwrap();
        let second = db
            .insert("test", &ColumnValues::new().with("name", "b".to_string()))
            .unwrap();
        assert_eq!((first, second), (1, 2));
    }

    #[test]
    fn test_insert_into_missing_table() {
        let db = DbManager::in_memory().unwrap();
        let result = db.insert("missing", &ColumnValues::new().with("id", 1_i64));
        assert!(matches!(result, Err(Error::Schema { .. })), "{result:?}");
    }

    #[test]
    fn test_insert_constraint_violation() {
        let db = DbManager::in_memory().unwrap();
        db.create_table(
            &TableSchema::new("strict")
                .column("id", "INTEGER PRIMARY KEY")
                .column("name", "TEXT NOT NULL"),
        )
        .unwrap();

        let result = db.insert("strict", &ColumnValues::new().with("id", 1_i64));
        assert!(matches!(result, Err(Error::Constraint { .. })), "{result:?}");
    }

    #[test]
    fn test_select_matching_rows() {
        let db = seeded();
        let rows = db
            .select("test", &["id", "name"], &ColumnValues::new().with("id", 1_i64))
            .unwrap();
        assert_eq!(rows, [row(1, "test")]);

        let names = db
            .select("test", &["name"], &ColumnValues::new().with("id", 1_i64))
            .unwrap();
        assert_eq!(names, [vec![Value::Text("test".to_string())]]);
    }

    #[test]
    fn test_select_no_match() {
        let db = seeded();
        let rows = db
            .select("test", &["id"], &ColumnValues::new().with("id", 2_i64))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_update_matching_row() {
        let db = seeded();
        let changed = db
            .update(
                "test",
                &ColumnValues::new().with("name", "test2".to_string()),
                &ColumnValues::new().with("id", 1_i64),
            )
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(db.select_all("test").unwrap(), [row(1, "test2")]);
    }

    #[test]
    fn test_update_no_match_is_noop() {
        let db = seeded();
        let changed = db
            .update(
                "test",
                &ColumnValues::new().with("name", "other".to_string()),
                &ColumnValues::new().with("id", 99_i64),
            )
            .unwrap();
        assert_eq!(changed, 0);
        assert_eq!(db.select_all("test").unwrap(), [row(1, "test")]);
    }

    #[test]
    fn test_delete() {
        let db = seeded();
        assert_eq!(
            db.delete("test", &ColumnValues::new().with("id", 2_i64))
                .unwrap(),
            0
        );
        assert_eq!(db.select_all("test").unwrap(), [row(1, "test")]);

        assert_eq!(
            db.delete("test", &ColumnValues::new().with("id", 1_i64))
                .unwrap(),
            1
        );
        assert!(db.select_all("test").unwrap().is_empty());
    }

    #[test]
    fn test_increment() {
        let db = DbManager::in_memory().unwrap();
        db.create_table(
            &TableSchema::new("counters")
                .column("id", "INTEGER PRIMARY KEY")
                .column("n", "INTEGER NOT NULL DEFAULT 0"),
        )
        .unwrap();
        db.insert("counters", &ColumnValues::new().with("id", 1_i64))
            .unwrap();

        let filter = ColumnValues::new().with("id", 1_i64);
        assert_eq!(db.increment("counters", "n", 5, &filter).unwrap(), 1);
        assert_eq!(db.increment("counters", "n", -2, &filter).unwrap(), 1);
        assert_eq!(
            db.select("counters", &["n"], &filter).unwrap(),
            [vec![Value::Integer(3)]]
        );

        let missing = ColumnValues::new().with("id", 2_i64);
        assert_eq!(db.increment("counters", "n", 1, &missing).unwrap(), 0);
    }

    #[test]
    fn test_increment_stops_at_integer_bounds() {
        let db = DbManager::in_memory().unwrap();
        db.create_table(
            &TableSchema::new("counters")
                .column("id", "INTEGER PRIMARY KEY")
                .column("n", "INTEGER NOT NULL"),
        )
        .unwrap();
        db.insert(
            "counters",
            &ColumnValues::new().with("id", 1_i64).with("n", i64::MAX),
        )
        .unwrap();
        db.insert(
            "counters",
            &ColumnValues::new().with("id", 2_i64).with("n", i64::MIN),
        )
        .unwrap();

        let first = ColumnValues::new().with("id", 1_i64);
        let second = ColumnValues::new().with("id", 2_i64);
        assert_eq!(db.increment("counters", "n", 1, &first).unwrap(), 0);
        assert_eq!(db.increment("counters", "n", -1, &second).unwrap(), 0);
        assert_eq!(
            db.select("counters", &["n"], &first).unwrap(),
            [vec![Value::Integer(i64::MAX)]]
        );
        assert_eq!(
            db.select("counters", &["n"], &second).unwrap(),
            [vec![Value::Integer(i64::MIN)]]
        );

        assert_eq!(db.increment("counters", "n", -1, &first).unwrap(), 1);
        assert_eq!(
            db.select("counters", &["n"], &first).unwrap(),
            [vec![Value::Integer(i64::MAX - 1)]]
        );
    }

    #[test]
    fn test_reads_do_not_begin_transaction() {
        let db = seeded();
        db.commit().unwrap();

        db.select_all("test").unwrap();
        db.list_tables().unwrap();
        db.query("SELECT COUNT(*) FROM \"test\"", &[]).unwrap();
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_empty_arguments_rejected() {
        let db = seeded();
        let none = ColumnValues::new();
        let no_columns: [&str; 0] = [];

        assert!(matches!(db.insert("test", &none), Err(Error::InvalidInput(_))));
        assert!(matches!(
            db.update("test", &none, &ColumnValues::new().with("id", 1_i64)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            db.select("test", &no_columns, &ColumnValues::new().with("id", 1_i64)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(db.delete("test", &none), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_raw_execute_and_query() {
        let db = seeded();
        let changed = db
            .execute(
                "UPDATE test SET name = ?1 WHERE id = ?2",
                &[Value::Text("raw".to_string()), Value::Integer(1)],
            )
            .unwrap();
        assert_eq!(changed, 1);

        let rows = db
            .query(
                "SELECT id, name FROM test WHERE name = ?1",
                &[Value::Text("raw".to_string())],
            )
            .unwrap();
        assert_eq!(rows, [row(1, "raw")]);
    }

    #[test]
    fn test_operations_on_closed_handle() {
        let mut db = seeded();
        db.close().unwrap();

        assert!(matches!(db.list_tables(), Err(Error::Connection(_))));
        assert!(matches!(db.select_all("test"), Err(Error::Connection(_))));
    }
}
