use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{DocumentFormat, LlmProvider};

/// A loaded source document. Immutable once the loader hands it out.
#[derive(Debug, Clone)]
pub struct RawDocument {
    path: PathBuf,
    bytes: Vec<u8>,
    text: String,
    format: DocumentFormat,
    page_count: usize,
    content_hash: String,
}

impl RawDocument {
    pub fn new(
        path: &Path,
        bytes: Vec<u8>,
        text: String,
        format: DocumentFormat,
        page_count: usize,
        content_hash: String,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            bytes,
            text,
            format,
            page_count,
            content_hash,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn source_info(&self) -> SourceInfo {
        SourceInfo {
            path: self.path.display().to_string(),
            content_hash: self.content_hash.clone(),
            format: self.format,
            page_count: self.page_count,
            byte_length: self.bytes.len(),
            text_length: self.text.chars().count(),
        }
    }
}

/// What the artifact records about the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub path: String,
    /// SHA-256 of the source bytes, base64.
    pub content_hash: String,
    pub format: DocumentFormat,
    pub page_count: usize,
    pub byte_length: usize,
    pub text_length: usize,
}

impl SourceInfo {
    /// File stem used to name result artifacts.
    pub fn stem(&self) -> String {
        Path::new(&self.path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

/// The language model's raw answer for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub text: String,
    pub provider: LlmProvider,
    pub model: String,
    pub prompt_version: String,
    /// Document text left out of the prompt by the input length cap.
    /// Measurements in that tail were never extracted.
    #[serde(default)]
    pub omitted_input_bytes: usize,
    pub requested_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}
