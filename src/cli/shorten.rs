//! `shorten` command: store a URL.

use super::{with_new_store, write_error};
use crate::Result;
use crate::models::LinkId;
use std::io::Write;
use std::path::Path;

/// Stores `url`, commits, and prints `<id> <short code>`.
///
/// Returns the new identifier.
pub fn cmd_shorten(db_path: &Path, url: &str, out: &mut impl Write) -> Result<LinkId> {
    let id = with_new_store(db_path, |store| {
        let id = store.insert_value(url)?;
        store.commit()?;
        Ok(id)
    })?;

    writeln!(out, "{id} {}", id.to_short_code()).map_err(|e| write_error(&e))?;
    Ok(id)
}
