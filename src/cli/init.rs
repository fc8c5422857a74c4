//! `init` command: create the database and the `links` table.

use super::{with_new_store, write_error};
use crate::Result;
use std::io::Write;
use std::path::Path;

/// Creates the database at `db_path` if needed and reports the link count.
///
/// Running it on an existing database is harmless.
pub fn cmd_init(db_path: &Path, out: &mut impl Write) -> Result<()> {
    let count = with_new_store(db_path, |store| store.count())?;
    tracing::info!(path = %db_path.display(), links = count, "database ready");

    writeln!(out, "Database ready: {} ({count} links)", db_path.display())
        .map_err(|e| write_error(&e))
}
