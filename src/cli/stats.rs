//! `stats` command: show a link without counting a click.

use super::{with_existing_store, write_error};
use crate::models::LinkId;
use crate::{Error, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Machine-readable output of `stats --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsOutput {
    /// Link identifier.
    pub id: LinkId,
    /// Base62 short code of the identifier.
    pub code: String,
    /// Destination URL.
    pub url: String,
    /// Recorded clicks.
    pub clicks: i64,
}

/// Prints the stored record for `id`, as text or JSON.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for an unknown identifier and
/// [`Error::Connection`] for a missing database.
pub fn cmd_stats(
    db_path: &Path,
    id: LinkId,
    json: bool,
    out: &mut impl Write,
) -> Result<StatsOutput> {
    let link = with_existing_store(db_path, |store| store.get_value(id))?;
    let stats = StatsOutput {
        id: link.id,
        code: link.id.to_short_code(),
        url: link.url,
        clicks: link.clicks,
    };

    if json {
        let rendered = serde_json::to_string_pretty(&stats).map_err(|e| Error::OperationFailed {
            operation: "serialize_stats".to_string(),
            cause: e.to_string(),
        })?;
        writeln!(out, "{rendered}").map_err(|e| write_error(&e))?;
    } else {
        writeln!(
            out,
            "id:     {}\ncode:   {}\nurl:    {}\nclicks: {}",
            stats.id, stats.code, stats.url, stats.clicks
        )
        .map_err(|e| write_error(&e))?;
    }

    Ok(stats)
}
