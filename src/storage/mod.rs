//! Storage layer.
//!
//! Two levels:
//! - **Generic**: [`DbManager`] and the statement builders in [`sqlite`]
//! - **Links**: [`LinkStore`], the URL shortener's `links` table

pub mod sqlite;

mod links;

pub use links::LinkStore;
pub use sqlite::{ColumnValues, DbManager, Row, TableSchema};
