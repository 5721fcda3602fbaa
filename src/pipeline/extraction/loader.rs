use std::path::Path;

use crate::models::{DocumentFormat, RawDocument};

use super::format::detect_format;
use super::hash::compute_content_hash;
use super::pdf::{PdfExtractor, PdfTextExtractor};
use super::sanitize::sanitize_extracted_text;
use super::UnreadableDocumentError;

/// Separator placed between PDF pages in the combined text.
pub const PAGE_BREAK: &str = "\n\n--- Page Break ---\n\n";

/// Reads one source document and extracts its plain text.
pub struct DocumentLoader {
    pdf: Box<dyn PdfExtractor + Send + Sync>,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(Box::new(PdfTextExtractor))
    }
}

impl DocumentLoader {
    pub fn new(pdf: Box<dyn PdfExtractor + Send + Sync>) -> Self {
        Self { pdf }
    }

    /// Load a document from disk. Fails when the file cannot be opened,
    /// is not a supported format, or yields no text.
    pub fn load(&self, path: &Path) -> Result<RawDocument, UnreadableDocumentError> {
        let bytes = std::fs::read(path).map_err(|source| UnreadableDocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_bytes(path, bytes)
    }

    /// Load from bytes already in memory. `path` only identifies the source.
    pub fn load_bytes(
        &self,
        path: &Path,
        bytes: Vec<u8>,
    ) -> Result<RawDocument, UnreadableDocumentError> {
        let format = detect_format(&bytes)?;

        let pages = match format {
            DocumentFormat::Pdf => self.pdf.extract_pages(&bytes)?,
            DocumentFormat::PlainText => {
                let text = std::str::from_utf8(&bytes)
                    .map_err(|e| UnreadableDocumentError::EncodingError(e.to_string()))?;
                vec![text.to_string()]
            }
        };

        let page_count = pages.len();
        let text = pages
            .iter()
            .map(|p| sanitize_extracted_text(p))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(PAGE_BREAK);

        if text.trim().is_empty() {
            return Err(UnreadableDocumentError::NoExtractableText(
                path.to_path_buf(),
            ));
        }

        let content_hash = compute_content_hash(&bytes);

        tracing::info!(
            path = %path.display(),
            format = format.as_str(),
            pages = page_count,
            text_length = text.len(),
            "Document loaded"
        );

        Ok(RawDocument::new(
            path,
            bytes,
            text,
            format,
            page_count,
            content_hash,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPages(Vec<&'static str>);

    impl PdfExtractor for FixedPages {
        fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, UnreadableDocumentError> {
            Ok(self.0.iter().map(|p| p.to_string()).collect())
        }
    }

    #[test]
    fn loads_plain_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "Product: Apple\nAtrazine: 5*\n").unwrap();

        let doc = DocumentLoader::default().load(&path).unwrap();
        assert_eq!(doc.format(), DocumentFormat::PlainText);
        assert_eq!(doc.text(), "Product: Apple\nAtrazine: 5*");
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.content_hash(), compute_content_hash(doc.bytes()));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let result = DocumentLoader::default().load(Path::new("/nonexistent/report.pdf"));
        assert!(matches!(result, Err(UnreadableDocumentError::Io { .. })));
    }

    #[test]
    fn whitespace_only_text_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "   \n\n  \t \n").unwrap();

        let result = DocumentLoader::default().load(&path);
        assert!(matches!(
            result,
            Err(UnreadableDocumentError::NoExtractableText(_))
        ));
    }

    #[test]
    fn pdf_pages_joined_with_break_and_empty_pages_dropped() {
        let loader = DocumentLoader::new(Box::new(FixedPages(vec![
            "Page one Atrazine",
            "   ",
            "Page three Glyphosate",
        ])));
        let doc = loader
            .load_bytes(Path::new("scan.pdf"), b"%PDF-1.4 fake".to_vec())
            .unwrap();
        assert_eq!(doc.page_count(), 3);
        assert_eq!(
            doc.text(),
            format!("Page one Atrazine{PAGE_BREAK}Page three Glyphosate")
        );
    }

    #[test]
    fn image_only_pdf_is_unreadable() {
        let loader = DocumentLoader::new(Box::new(FixedPages(vec!["", "  "])));
        let result = loader.load_bytes(Path::new("scan.pdf"), b"%PDF-1.4 fake".to_vec());
        assert!(matches!(
            result,
            Err(UnreadableDocumentError::NoExtractableText(_))
        ));
    }

    #[test]
    fn loads_real_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, super::super::pdf::tests::make_test_pdf("Glyphosate 12")).unwrap();

        let doc = DocumentLoader::default().load(&path).unwrap();
        assert_eq!(doc.format(), DocumentFormat::Pdf);
        assert!(doc.text().contains("Glyphosate"));
    }
}
