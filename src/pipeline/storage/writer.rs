use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::models::DocumentResult;

use super::PersistenceError;

/// Writes one JSON artifact per pipeline attempt.
///
/// Artifacts are named `<source stem>-<document_id>.json`, so a re-run of the
/// same source never replaces an earlier attempt.
pub struct ResultWriter {
    output_dir: PathBuf,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn artifact_path(&self, result: &DocumentResult) -> PathBuf {
        let stem: String = result
            .source
            .stem()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.output_dir
            .join(format!("{stem}-{}.json", result.document_id))
    }

    /// Serialize `result` and move it into place atomically.
    ///
    /// The JSON is written to a temporary file in the output directory, synced,
    /// then renamed; a failure at any step leaves no artifact behind.
    pub fn write(&self, result: &DocumentResult) -> Result<PathBuf, PersistenceError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| PersistenceError::Io { path, source }
        };

        std::fs::create_dir_all(&self.output_dir).map_err(io_err(&self.output_dir))?;

        let json = serde_json::to_vec_pretty(result)?;
        let target = self.artifact_path(result);

        let mut tmp = NamedTempFile::new_in(&self.output_dir).map_err(io_err(&self.output_dir))?;
        tmp.write_all(&json).map_err(io_err(tmp.path()))?;
        tmp.as_file().sync_all().map_err(io_err(tmp.path()))?;

        tmp.persist_noclobber(&target).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                PersistenceError::AlreadyExists(target.clone())
            } else {
                PersistenceError::Io {
                    path: target.clone(),
                    source: e.error,
                }
            }
        })?;

        tracing::info!(
            doc_id = %result.document_id,
            path = %target.display(),
            bytes = json.len(),
            "Result artifact written"
        );
        Ok(target)
    }
}

/// Load an artifact written by [`ResultWriter::write`].
pub fn read_result(path: &Path) -> Result<DocumentResult, PersistenceError> {
    let bytes = std::fs::read(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}
