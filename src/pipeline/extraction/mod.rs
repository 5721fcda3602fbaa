pub mod format;
pub mod hash;
pub mod loader;
pub mod pdf;
pub mod sanitize;

pub use format::*;
pub use hash::*;
pub use loader::*;
pub use pdf::*;
pub use sanitize::*;

use std::path::PathBuf;

use thiserror::Error;

/// The source document could not be turned into text. Aborts that document only.
#[derive(Error, Debug)]
pub enum UnreadableDocumentError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Text encoding error: {0}")]
    EncodingError(String),

    #[error("No extractable text in {0}")]
    NoExtractableText(PathBuf),
}
