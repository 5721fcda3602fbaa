pub mod writer;

pub use writer::*;

use std::path::PathBuf;

use thiserror::Error;

/// The result artifact could not be written or read back. Fatal for the
/// document's run: no result is reported without its artifact.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Artifact already exists: {0}")]
    AlreadyExists(PathBuf),
}
