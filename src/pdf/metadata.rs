//! PDF metadata and text extraction

use lopdf::{Document, Object};
use crate::error::Result;
use crate::pdf::document::{load_document, page_count};

/// PDF metadata
#[derive(Debug, Clone, PartialEq)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Size of the file in bytes
    pub byte_len: usize,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
}

/// Extract metadata from PDF bytes
pub fn extract_metadata(bytes: &[u8]) -> Result<PdfMetadata> {
    let doc = load_document(bytes)?;

    Ok(PdfMetadata {
        page_count: page_count(&doc),
        byte_len: bytes.len(),
        title: info_string(&doc, b"Title"),
        author: info_string(&doc, b"Author"),
    })
}

/// Read a UTF-8 text entry from the trailer's Info dictionary
fn info_string(doc: &Document, key: &[u8]) -> Option<String> {
    let info_id = doc.trailer.get(b"Info").and_then(Object::as_reference).ok()?;
    let info_dict = doc.get_object(info_id).and_then(Object::as_dict).ok()?;
    let value = info_dict.get(key).and_then(Object::as_str).ok()?;
    String::from_utf8(value.to_vec()).ok()
}

/// Extract the text of every page, pages separated by a blank line
///
/// Pages whose text cannot be decoded contribute an empty string.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let doc = load_document(bytes)?;

    let mut text = String::new();
    for page_number in doc.get_pages().into_keys() {
        text.push_str(&doc.extract_text(&[page_number]).unwrap_or_default());
        text.push_str("\n\n");
    }

    Ok(text)
}
