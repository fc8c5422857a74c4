//! SQL construction for generic table operations.
//!
//! Values never appear in generated SQL text: every builder returns the
//! statement with numbered placeholders (`?1`, `?2`, ...) together with the
//! values to bind, in placeholder order. Table and column names cannot be
//! bound, so they are restricted to plain identifiers and double-quoted.

use crate::{Error, Result};
use rusqlite::types::Value;

/// Checks that `name` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the name is empty or contains any other
/// character.
///
/// # Examples
///
/// ```
/// use vitedb::storage::sqlite::validate_identifier;
///
/// assert!(validate_identifier("links").is_ok());
/// assert!(validate_identifier("links; DROP TABLE links").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "'{name}' is not a valid identifier"
        )))
    }
}

/// Validates an identifier and returns it double-quoted for use in SQL.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the name is not a plain identifier.
pub fn quote_identifier(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// Checks a column type declaration such as `INTEGER PRIMARY KEY AUTOINCREMENT`.
///
/// Declarations are spliced into `CREATE TABLE`, so only letters, digits,
/// spaces, underscores, parentheses and commas are accepted. That rules out
/// quotes, statement separators and comment markers.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an empty or unsafe declaration.
pub fn validate_type_declaration(declaration: &str) -> Result<()> {
    let trimmed = declaration.trim();
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '(' | ')' | ',');
    if !trimmed.is_empty() && trimmed.chars().all(allowed) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "'{declaration}' is not a valid column type declaration"
        )))
    }
}

/// Ordered `(column, value)` pairs for SET clauses, inserts and filters.
///
/// Keeps each column next to the value bound for it, so the column list and
/// the parameter list cannot drift apart.
///
/// # Examples
///
/// ```
/// use vitedb::storage::ColumnValues;
///
/// let values = ColumnValues::new()
///     .with("id", 1_i64)
///     .with("name", "test".to_string());
/// assert_eq!(values.columns().collect::<Vec<_>>(), ["id", "name"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnValues {
    pairs: Vec<(String, Value)>,
}

impl ColumnValues {
    /// Creates an empty set of bindings.
    #[must_use]
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Adds a binding and returns `self`.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    /// Adds a binding in place.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.pairs.push((column.into(), value.into()));
    }

    /// Pairs up separate column and value sequences.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the sequences differ in length.
    pub fn from_pairs<C, V>(columns: &[C], values: V) -> Result<Self>
    where
        C: AsRef<str>,
        V: IntoIterator,
        V::Item: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if columns.len() != values.len() {
            return Err(Error::InvalidInput(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self {
            pairs: columns
                .iter()
                .map(|c| c.as_ref().to_string())
                .zip(values)
                .collect(),
        })
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true when there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Column names, in binding order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(column, _)| column.as_str())
    }

    /// Bound values, in binding order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.pairs.iter().map(|(_, value)| value)
    }
}

/// Table descriptor: a name plus ordered column declarations.
///
/// Only used to create the table; the database itself is the source of truth
/// for the schema afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<(String, String)>,
}

impl TableSchema {
    /// Starts a descriptor for `name` with no columns.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Appends a column and its type declaration.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, declaration: impl Into<String>) -> Self {
        self.columns.push((name.into(), declaration.into()));
        self
    }

    /// The table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `(column, declaration)` pairs in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[(String, String)] {
        &self.columns
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }
}

/// A generated statement and the values bound to its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    /// SQL text with `?N` placeholders.
    pub sql: String,
    /// Values for `?1..?N`, in order.
    pub params: Vec<Value>,
}

/// Builds `CREATE TABLE IF NOT EXISTS` for a descriptor.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the schema has no columns, or a name or
/// type declaration is rejected.
pub fn build_create_table(schema: &TableSchema) -> Result<String> {
    if schema.columns.is_empty() {
        return Err(Error::InvalidInput(format!(
            "table '{}' needs at least one column",
            schema.name
        )));
    }
    let table = quote_identifier(&schema.name)?;
    let columns = schema
        .columns
        .iter()
        .map(|(name, declaration)| {
            validate_type_declaration(declaration)?;
            Ok(format!("{} {}", quote_identifier(name)?, declaration.trim()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {table} ({})",
        columns.join(", ")
    ))
}

/// Builds `INSERT INTO table (c1, c2) VALUES (?1, ?2)`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for empty bindings or invalid names.
pub fn build_insert(table: &str, values: &ColumnValues) -> Result<BoundStatement> {
    require_bindings(values, "insert")?;
    let table = quote_identifier(table)?;
    let columns = quote_all(values.columns())?;
    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();

    Ok(BoundStatement {
        sql: format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        ),
        params: values.values().cloned().collect(),
    })
}

/// Builds `UPDATE table SET c1 = ?1 WHERE w1 = ?2 AND ...`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for empty assignments, an empty filter, or
/// invalid names.
pub fn build_update(
    table: &str,
    set: &ColumnValues,
    filter: &ColumnValues,
) -> Result<BoundStatement> {
    require_bindings(set, "update assignments")?;
    require_bindings(filter, "update filter")?;
    let table = quote_identifier(table)?;

    let mut param_idx = 1;
    let assignments = numbered_conditions(set, &mut param_idx)?;
    let conditions = numbered_conditions(filter, &mut param_idx)?;

    Ok(BoundStatement {
        sql: format!(
            "UPDATE {table} SET {} WHERE {}",
            assignments.join(", "),
            conditions.join(" AND ")
        ),
        params: set.values().chain(filter.values()).cloned().collect(),
    })
}

/// Builds `SELECT c1, c2 FROM table WHERE w1 = ?1 AND ... ORDER BY rowid`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an empty column list, an empty filter,
/// or invalid names.
pub fn build_select<C: AsRef<str>>(
    table: &str,
    columns: &[C],
    filter: &ColumnValues,
) -> Result<BoundStatement> {
    if columns.is_empty() {
        return Err(Error::InvalidInput(
            "select needs at least one column".to_string(),
        ));
    }
    require_bindings(filter, "select filter")?;
    let table = quote_identifier(table)?;
    let columns = quote_all(columns.iter().map(AsRef::as_ref))?;

    let mut param_idx = 1;
    let conditions = numbered_conditions(filter, &mut param_idx)?;

    Ok(BoundStatement {
        sql: format!(
            "SELECT {} FROM {table} WHERE {} ORDER BY rowid",
            columns.join(", "),
            conditions.join(" AND ")
        ),
        params: filter.values().cloned().collect(),
    })
}

/// Builds `DELETE FROM table WHERE w1 = ?1 AND ...`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an empty filter or invalid names.
pub fn build_delete(table: &str, filter: &ColumnValues) -> Result<BoundStatement> {
    require_bindings(filter, "delete filter")?;
    let table = quote_identifier(table)?;

    let mut param_idx = 1;
    let conditions = numbered_conditions(filter, &mut param_idx)?;

    Ok(BoundStatement {
        sql: format!("DELETE FROM {table} WHERE {}", conditions.join(" AND ")),
        params: filter.values().cloned().collect(),
    })
}

/// Builds `UPDATE table SET c = c + ?1 WHERE c <= ?2 AND w1 = ?3 AND ...`.
///
/// The addition happens inside the store, so concurrent increments cannot
/// lose updates the way a read-then-write would. `?2` bounds the current
/// value so the sum stays within `i64`; `SQLite` would otherwise turn an
/// overflowing sum into a REAL. Rows at the bound are left untouched.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an empty filter or invalid names.
pub fn build_increment(
    table: &str,
    column: &str,
    delta: i64,
    filter: &ColumnValues,
) -> Result<BoundStatement> {
    require_bindings(filter, "increment filter")?;
    let table = quote_identifier(table)?;
    let column = quote_identifier(column)?;

    let (guard, bound) = if delta >= 0 {
        (format!("{column} <= ?2"), i64::MAX - delta)
    } else {
        (format!("{column} >= ?2"), i64::MIN - delta)
    };

    let mut param_idx = 3;
    let mut conditions = vec![guard];
    conditions.extend(numbered_conditions(filter, &mut param_idx)?);

    let mut params = Vec::with_capacity(filter.len() + 2);
    params.push(Value::Integer(delta));
    params.push(Value::Integer(bound));
    params.extend(filter.values().cloned());

    Ok(BoundStatement {
        sql: format!(
            "UPDATE {table} SET {column} = {column} + ?1 WHERE {}",
            conditions.join(" AND ")
        ),
        params,
    })
}

fn require_bindings(values: &ColumnValues, what: &str) -> Result<()> {
    if values.is_empty() {
        Err(Error::InvalidInput(format!("{what} needs at least one column")))
    } else {
        Ok(())
    }
}

fn quote_all<'a>(names: impl Iterator<Item = &'a str>) -> Result<Vec<String>> {
    names.map(quote_identifier).collect()
}

/// Renders `"col" = ?N` for each binding, advancing `param_idx`.
fn numbered_conditions(values: &ColumnValues, param_idx: &mut usize) -> Result<Vec<String>> {
    values
        .columns()
        .map(|column| {
            let condition = format!("{} = ?{param_idx}", quote_identifier(column)?);
            *param_idx += 1;
            Ok(condition)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("links" ; "lowercase")]
    #[test_case("_private" ; "leading underscore")]
    #[test_case("Table_2" ; "mixed case with digit")]
    fn test_validate_identifier_accepts(name: &str) {
        assert!(validate_identifier(name).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("2fast" ; "leading digit")]
    #[test_case("my table" ; "space")]
    #[test_case("links\"; DROP TABLE links; --" ; "quote injection")]
    #[test_case("naïve" ; "non ascii")]
    fn test_validate_identifier_rejects(name: &str) {
        assert!(matches!(
            validate_identifier(name),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test_case("INTEGER" ; "plain type")]
    #[test_case("INTEGER PRIMARY KEY AUTOINCREMENT" ; "autoincrement key")]
    #[test_case("NUMERIC(10, 2)" ; "precision")]
    #[test_case("INTEGER NOT NULL DEFAULT 0" ; "default")]
    fn test_validate_type_declaration_accepts(declaration: &str) {
        assert!(validate_type_declaration(declaration).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("TEXT); DROP TABLE links; --" ; "statement separator")]
    #[test_case("TEXT DEFAULT 'x'" ; "quoted literal")]
    #[test_case("TEXT -- comment" ; "comment")]
    fn test_validate_type_declaration_rejects(declaration: &str) {
        assert!(matches!(
            validate_type_declaration(declaration),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_pairs_length_mismatch() {
        let result = ColumnValues::from_pairs(&["id", "name"], [Value::Integer(1)]);
        assert!(matches!(result, Err(Error::InvalidInput(ref msg)) if msg.contains("2 columns but 1 values")));
    }

    #[test]
    fn test_from_pairs_keeps_order() {
        let values =
            ColumnValues::from_pairs(&["id", "name"], [Value::Integer(1), Value::Text("a".into())])
                .unwrap();
        assert_eq!(values.columns().collect::<Vec<_>>(), ["id", "name"]);
        assert_eq!(
            values.values().cloned().collect::<Vec<_>>(),
            [Value::Integer(1), Value::Text("a".into())]
        );
    }

    #[test]
    fn test_build_create_table() {
        let schema = TableSchema::new("test")
            .column("id", "INTEGER")
            .column("name", "TEXT");
        assert_eq!(
            build_create_table(&schema).unwrap(),
            "CREATE TABLE IF NOT EXISTS \"test\" (\"id\" INTEGER, \"name\" TEXT)"
        );
    }

    #[test]
    fn test_build_create_table_without_columns() {
        let schema = TableSchema::new("empty");
        assert!(matches!(
            build_create_table(&schema),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_build_insert_binds_values() {
        let values = ColumnValues::new()
            .with("id", 1_i64)
            .with("name", "test'); DROP TABLE test; --".to_string());
        let stmt = build_insert("test", &values).unwrap();

        assert_eq!(
            stmt.sql,
            "INSERT INTO \"test\" (\"id\", \"name\") VALUES (?1, ?2)"
        );
        assert!(!stmt.sql.contains("DROP"));
        assert_eq!(
            stmt.params,
            [
                Value::Integer(1),
                Value::Text("test'); DROP TABLE test; --".to_string())
            ]
        );
    }

    #[test]
    fn test_build_insert_empty() {
        assert!(matches!(
            build_insert("test", &ColumnValues::new()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_build_update_numbers_set_then_filter() {
        let set = ColumnValues::new()
            .with("name", "test2".to_string())
            .with("score", 3_i64);
        let filter = ColumnValues::new().with("id", 1_i64).with("kind", 4_i64);
        let stmt = build_update("test", &set, &filter).unwrap();

        assert_eq!(
            stmt.sql,
            "UPDATE \"test\" SET \"name\" = ?1, \"score\" = ?2 WHERE \"id\" = ?3 AND \"kind\" = ?4"
        );
        assert_eq!(
            stmt.params,
            [
                Value::Text("test2".to_string()),
                Value::Integer(3),
                Value::Integer(1),
                Value::Integer(4)
            ]
        );
    }

    #[test]
    fn test_build_update_requires_filter() {
        let set = ColumnValues::new().with("name", "x".to_string());
        assert!(matches!(
            build_update("test", &set, &ColumnValues::new()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_build_select() {
        let filter = ColumnValues::new().with("id", 1_i64);
        let stmt = build_select("test", &["id", "name"], &filter).unwrap();

        assert_eq!(
            stmt.sql,
            "SELECT \"id\", \"name\" FROM \"test\" WHERE \"id\" = ?1 ORDER BY rowid"
        );
        assert_eq!(stmt.params, [Value::Integer(1)]);
    }

    #[test]
    fn test_build_select_requires_columns() {
        let filter = ColumnValues::new().with("id", 1_i64);
        let no_columns: [&str; 0] = [];
        assert!(matches!(
            build_select("test", &no_columns, &filter),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_build_delete() {
        let filter = ColumnValues::new().with("id", 1_i64);
        let stmt = build_delete("test", &filter).unwrap();

        assert_eq!(stmt.sql, "DELETE FROM \"test\" WHERE \"id\" = ?1");
        assert_eq!(stmt.params, [Value::Integer(1)]);
    }

    #[test]
    fn test_build_increment_binds_delta_first() {
        let filter = ColumnValues::new().with("id", 9_i64);
        let stmt = build_increment("links", "clicks", 1, &filter).unwrap();

        assert_eq!(
            stmt.sql,
            "UPDATE \"links\" SET \"clicks\" = \"clicks\" + ?1 \
             WHERE \"clicks\" <= ?2 AND \"id\" = ?3"
        );
        assert_eq!(
            stmt.params,
            [Value::Integer(1), Value::Integer(i64::MAX - 1), Value::Integer(9)]
        );
    }

    #[test]
    fn test_build_increment_negative_delta_bounds_below() {
        let filter = ColumnValues::new().with("id", 9_i64);
        let stmt = build_increment("links", "clicks", -3, &filter).unwrap();

        assert!(stmt.sql.contains("\"clicks\" >= ?2"));
        assert_eq!(stmt.params[1], Value::Integer(i64::MIN + 3));
    }

    #[test]
    fn test_invalid_column_name_rejected_before_sql() {
        let filter = ColumnValues::new().with("id = 1 OR 1", 1_i64);
        assert!(matches!(
            build_delete("test", &filter),
            Err(Error::InvalidInput(_))
        ));
    }
}
