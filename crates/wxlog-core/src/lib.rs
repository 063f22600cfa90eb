//! Core record model, unit normalization, display labels and trend fitting
//!
//! This crate holds everything that works on a single parsed line or a
//! single value column. Directory scanning lives in `wxlog-ingest`, range
//! queries over the merged series in `wxlog-archive`.

pub mod labels;
pub mod record;
pub mod schema;
pub mod trend;
pub mod units;

pub use labels::*;
pub use record::*;
pub use schema::*;
pub use trend::*;
pub use units::*;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// Malformed line, unparseable value or unresolvable time format
    #[error("Format error: {0}")]
    Format(String),

    /// Field key not present in the schema
    #[error("Unknown field key: {0}")]
    Key(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
