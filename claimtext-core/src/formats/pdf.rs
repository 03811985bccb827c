use crate::error::ExtractionError;
use lopdf::Document;
use std::path::Path;

/// Embedded text of every page, concatenated in page order.
///
/// No layout reconstruction: scanned PDFs without a text layer come back empty.
pub fn extract_pdf_text(path: &Path) -> Result<String, ExtractionError> {
    let document = Document::load(path).map_err(|e| ExtractionError::decode(path, e))?;
    let pages = document.get_pages();

    let mut text = String::new();
    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(e) => tracing::warn!(
                path = %path.display(),
                page = page_number,
                error = %e,
                "skipping pdf page without extractable text"
            ),
        }
    }

    tracing::debug!(path = %path.display(), pages = pages.len(), chars = text.len(), "extracted pdf text");
    Ok(text)
}
