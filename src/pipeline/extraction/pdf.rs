use super::UnreadableDocumentError;

/// PDF text extraction abstraction
pub trait PdfExtractor {
    /// Text of each page, in page order.
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, UnreadableDocumentError>;
}

/// PDF text extractor using the pdf-extract crate.
/// Handles digital PDFs with embedded text layers; scans yield empty pages.
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, UnreadableDocumentError> {
        guard_panics(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
                .map_err(|e| UnreadableDocumentError::PdfParsing(e.to_string()))
        })
    }
}

/// pdf-extract can panic on malformed PDFs. A panic fails this document only.
fn guard_panics<F>(extract: F) -> Result<Vec<String>, UnreadableDocumentError>
where
    F: FnOnce() -> Result<Vec<String>, UnreadableDocumentError>,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(extract)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            tracing::warn!(detail = %detail, "PDF text extraction panicked");
            Err(UnreadableDocumentError::PdfParsing(format!(
                "extractor panicked (malformed PDF): {detail}"
            )))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Generate a valid single-page PDF with text using lopdf.
    pub(crate) fn make_test_pdf(text: &str) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Document, Object, Stream};

        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let content = format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let resources = dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        };

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });

        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Parent", pages_id);
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn extract_text_from_digital_pdf() {
        let pages = PdfTextExtractor
            .extract_pages(&make_test_pdf("Atrazine 5 mg/kg"))
            .unwrap();
        assert_eq!(pages.len(), 1);
        let full_text: String = pages.concat();
        assert!(
            full_text.contains("Atrazine"),
            "Expected text to contain 'Atrazine', got: {full_text}"
        );
    }

    #[test]
    fn extractor_panic_becomes_parse_error() {
        let result = guard_panics(|| panic!("unexpected xref entry"));
        match result {
            Err(UnreadableDocumentError::PdfParsing(message)) => {
                assert!(message.contains("unexpected xref entry"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let result = PdfTextExtractor.extract_pages(b"%PDF-not really");
        assert!(matches!(result, Err(UnreadableDocumentError::PdfParsing(_))));
    }
}
