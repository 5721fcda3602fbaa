pub mod evaluator;
pub mod limits;

pub use evaluator::*;
pub use limits::*;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// A reference file (limit table or alias table) could not be loaded.
/// Nothing is processed against partially loaded reference data.
#[derive(Error, Debug)]
pub enum ReferenceDataError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed delimited file {path} (line {line:?}): {message}")]
    Csv {
        path: PathBuf,
        line: Option<u64>,
        message: String,
    },

    #[error("{path} line {line}: {reason}")]
    InvalidRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Conflicting limits for {analyte} / {commodity}: {first} and {second}")]
    ConflictingLimit {
        analyte: String,
        commodity: String,
        first: u64,
        second: u64,
    },

    #[error("{analyte} / {commodity} is listed both with limit {limit} and as needing no limit")]
    ExemptWithLimit {
        analyte: String,
        commodity: String,
        limit: u64,
    },

    #[error("Alias '{alias}' maps to both '{first}' and '{second}'")]
    ConflictingAlias {
        alias: String,
        first: String,
        second: String,
    },
}

impl ReferenceDataError {
    pub(crate) fn from_csv(path: &Path, e: csv::Error) -> Self {
        let line = e.position().map(|p| p.line());
        let message = e.to_string();
        match e.into_kind() {
            csv::ErrorKind::Io(source) => Self::Io {
                path: path.to_path_buf(),
                source,
            },
            _ => Self::Csv {
                path: path.to_path_buf(),
                line,
                message,
            },
        }
    }
}
