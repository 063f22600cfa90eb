//! Station export ingestion
//!
//! Scans a directory for export files, parses every data line into a
//! record, normalizes units per file and merges everything into one
//! time-ordered [`Dataset`](wxlog_archive::Dataset).

pub mod builder;
pub mod discovery;

pub use builder::*;
pub use discovery::*;

use std::path::PathBuf;
use thiserror::Error;
use wxlog_core::CoreError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Malformed line at {}:{line}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: CoreError,
    },

    #[error("Failed to read '{}'", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
}

impl IngestError {
    /// Underlying record error, if this failure came from a line
    pub fn core_error(&self) -> Option<&CoreError> {
        match self {
            IngestError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
