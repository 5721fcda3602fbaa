use crate::models::DocumentFormat;

use super::UnreadableDocumentError;

/// Largest source document accepted (bytes).
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024; // 100MB

/// Detect the document format from magic bytes (NOT file extensions).
pub fn detect_format(bytes: &[u8]) -> Result<DocumentFormat, UnreadableDocumentError> {
    let size = bytes.len() as u64;
    if size > MAX_FILE_SIZE {
        return Err(UnreadableDocumentError::FileTooLarge {
            size_mb: size as f64 / (1024.0 * 1024.0),
            max_mb: MAX_FILE_SIZE / (1024 * 1024),
        });
    }

    match &bytes[..bytes.len().min(8)] {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Ok(DocumentFormat::Pdf),
        // Image scans need a vision model
        [0xFF, 0xD8, 0xFF, ..] => Err(UnreadableDocumentError::UnsupportedFormat(
            "image/jpeg".into(),
        )),
        [0x89, 0x50, 0x4E, 0x47, ..] => Err(UnreadableDocumentError::UnsupportedFormat(
            "image/png".into(),
        )),
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Err(
            UnreadableDocumentError::UnsupportedFormat("image/tiff".into()),
        ),
        _ if is_likely_text(bytes) => Ok(DocumentFormat::PlainText),
        _ => Err(UnreadableDocumentError::UnsupportedFormat(
            "application/octet-stream".into(),
        )),
    }
}

/// Check if bytes are likely plain text (valid UTF-8, mostly printable).
fn is_likely_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }

    // Only the head is sampled; cut on a char boundary
    let head = &bytes[..bytes.len().min(4096)];
    let text = match std::str::from_utf8(head) {
        Ok(t) => t,
        Err(e) if e.valid_up_to() > 0 && e.error_len().is_none() => {
            // Truncated multi-byte sequence at the sample edge
            match std::str::from_utf8(&head[..e.valid_up_to()]) {
                Ok(t) => t,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };

    let total = text.chars().count().max(1);
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    printable as f64 / total as f64 > 0.80
}
