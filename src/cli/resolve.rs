//! `resolve` command: follow a short link.

use super::{with_existing_store, write_error};
use crate::Result;
use crate::models::{Link, LinkId};
use std::io::Write;
use std::path::Path;

/// Counts one click on `id`, commits, and prints the destination URL.
///
/// # Errors
///
/// Returns [`crate::Error::NotFound`] for an unknown identifier and
/// [`crate::Error::Connection`] for a missing database; nothing is written in
/// either case.
pub fn cmd_resolve(db_path: &Path, id: LinkId, out: &mut impl Write) -> Result<Link> {
    let link = with_existing_store(db_path, |store| {
        let link = store.resolve(id)?;
        store.commit()?;
        Ok(link)
    })?;

    writeln!(out, "{}", link.url).map_err(|e| write_error(&e))?;
    Ok(link)
}
