//! `tables` command.

use super::{with_existing_store, write_error};
use crate::Result;
use std::io::Write;
use std::path::Path;

/// Prints one table name per line.
///
/// # Errors
///
/// Returns [`crate::Error::Connection`] if the database does not exist.
pub fn cmd_tables(db_path: &Path, out: &mut impl Write) -> Result<Vec<String>> {
    let tables = with_existing_store(db_path, |store| store.db().list_tables())?;
    for table in &tables {
        writeln!(out, "{table}").map_err(|e| write_error(&e))?;
    }
    Ok(tables)
}
