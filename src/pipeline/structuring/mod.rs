pub mod agent;
pub mod ollama;
pub mod openai;
pub mod parser;
pub mod prompt;
pub mod sanitize;
pub mod types;

pub use agent::*;
pub use ollama::*;
pub use openai::*;
pub use parser::*;
pub use prompt::*;
pub use sanitize::*;
pub use types::*;

use thiserror::Error;

/// The language-model call failed. Aborts the document's pipeline; the
/// operator may re-run extraction explicitly.
#[derive(Error, Debug)]
pub enum ExtractionServiceError {
    #[error("Language model service is not reachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Service rejected the credentials (status {0})")]
    Unauthorized(u16),

    #[error("Service returned error (status {status}): {body}")]
    ServiceError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed service envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("No language model service configured for this run")]
    Offline,
}

/// The model response could not be parsed at all.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResponseParseError {
    #[error("Extraction response is empty")]
    EmptyResponse,
}
