//! Data models for vitedb.
//!
//! Records handed across the storage boundary.

mod link;

pub use link::{Link, LinkId, SHORT_CODE_ALPHABET};
