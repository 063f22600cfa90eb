//! In-memory station series and range queries
//!
//! Holds the merged, time-ordered records of one ingestion run and
//! answers range/column projections and trend fits against them.

pub mod dataset;
pub mod query;

pub use dataset::*;
pub use query::*;

use chrono::NaiveDateTime;
use thiserror::Error;
use wxlog_core::{CoreError, TrendError};

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Invalid range: start {start} is not before end {end}")]
    Range {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Trend fit failed: {0}")]
    Trend(#[from] TrendError),
}

pub type QueryResult<T> = Result<T, QueryError>;
