//! CLI command implementations.
//!
//! Each submodule implements one `vitedb` subcommand. Handlers open the link
//! store in a scope, commit on success and write their output to the given
//! writer, so the binary stays a thin argument-parsing shell. Only `init` and
//! `shorten` create a missing database; the other commands report it.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `init` | Create the database file and the `links` table |
//! | `shorten` | Store a URL and print its id and short code |
//! | `resolve` | Count a click and print the destination URL |
//! | `stats` | Show a link's URL and click count |
//! | `tables` | List the tables in the database |
//!
//! # Example Usage
//!
//! ```bash
//! vitedb shorten https://example.org/
//! vitedb resolve 1
//! vitedb stats --json b
//! ```

mod init;
mod resolve;
mod shorten;
mod stats;
mod tables;

pub use init::cmd_init;
pub use resolve::cmd_resolve;
pub use shorten::cmd_shorten;
pub use stats::{StatsOutput, cmd_stats};
pub use tables::cmd_tables;

use crate::models::LinkId;
use crate::storage::LinkStore;
use crate::{Error, Result};
use std::io;
use std::path::Path;

/// Parses a link reference given on the command line.
///
/// A decimal number is a link id unless `as_code` is set; anything else is a
/// base62 short code.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the reference is neither.
pub fn parse_link_ref(reference: &str, as_code: bool) -> Result<LinkId> {
    let reference = reference.trim();
    if !as_code {
        if let Ok(id) = reference.parse::<LinkId>() {
            return Ok(id);
        }
    }
    LinkId::from_short_code(reference)
}

/// Opens the store at `path` for one command, creating the file and parent
/// directories as needed.
///
/// The store is closed when `f` returns; `f` commits what it wants to keep.
pub(crate) fn with_new_store<T, F>(path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&mut LinkStore) -> Result<T>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_database_dir".to_string(),
            cause: format!("{}: {e}", parent.display()),
        })?;
    }
    LinkStore::scoped(path, f)
}

/// Opens the existing store at `path` for one command.
///
/// A missing database file is an [`Error::Connection`]; nothing is created.
pub(crate) fn with_existing_store<T, F>(path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&mut LinkStore) -> Result<T>,
{
    LinkStore::scoped_existing(path, f)
}

pub(crate) fn write_error(e: &io::Error) -> Error {
    Error::OperationFailed {
        operation: "write_output".to_string(),
        cause: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1", false, 1 ; "decimal id")]
    #[test_case(" 42 ", false, 42 ; "padded id")]
    #[test_case("10", true, 62 ; "digits forced as code")]
    #[test_case("b", false, 11 ; "letter code")]
    #[test_case("ZZ", false, 3843 ; "two digit code")]
    fn test_parse_link_ref(reference: &str, as_code: bool, expected: i64) {
        assert_eq!(
            parse_link_ref(reference, as_code).unwrap(),
            LinkId::new(expected)
        );
    }

    #[test]
    fn test_parse_link_ref_rejects_garbage() {
        assert!(matches!(
            parse_link_ref("not a link", false),
            Err(Error::InvalidInput(_))
        ));
    }
}
