//! Byte-in, byte-out operations
//!
//! One function per toolkit operation, each taking the uploaded document as
//! bytes and returning the finished document as bytes. Nothing here touches
//! the filesystem.

use tracing::debug;

use crate::error::Result;
use crate::pdf::document::{load_document, page_count};
use crate::pdf::{
    composite_watermark, extract_metadata, extract_text, merge_documents, recompose, rotate_all,
    OverlaySource, PdfMetadata, RecomposeMode, Rotation, WatermarkOptions,
};
use crate::range::resolve_pages;

/// Which pages a rotation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateTarget<'a> {
    /// Every page
    All,
    /// Pages matching a range expression such as `"1,3,5-7"`
    Pages(&'a str),
}

/// Keep only the pages matched by `expression`, in ascending order
pub fn split(bytes: &[u8], expression: &str) -> Result<Vec<u8>> {
    select(bytes, expression, RecomposeMode::Extract)
}

/// Remove the pages matched by `expression`
pub fn delete_pages(bytes: &[u8], expression: &str) -> Result<Vec<u8>> {
    select(bytes, expression, RecomposeMode::Delete)
}

/// Rotate all pages or the pages matched by an expression
pub fn rotate(bytes: &[u8], target: RotateTarget<'_>, degrees: i64) -> Result<Vec<u8>> {
    let rotation = Rotation::new(degrees)?;

    match target {
        RotateTarget::All => rotate_all(&load_document(bytes)?, rotation),
        RotateTarget::Pages(expression) => select(bytes, expression, RecomposeMode::Rotate(rotation)),
    }
}

/// Stamp a watermark on every page
pub fn watermark(bytes: &[u8], source: &OverlaySource, options: &WatermarkOptions) -> Result<Vec<u8>> {
    composite_watermark(load_document(bytes)?, source, options)
}

/// Concatenate documents in the order given
pub fn merge<B: AsRef<[u8]>>(inputs: &[B]) -> Result<Vec<u8>> {
    merge_documents(inputs)
}

/// Page count, size and Info dictionary fields
pub fn info(bytes: &[u8]) -> Result<PdfMetadata> {
    extract_metadata(bytes)
}

/// Text of every page, pages separated by a blank line
pub fn text(bytes: &[u8]) -> Result<String> {
    extract_text(bytes)
}

fn select(bytes: &[u8], expression: &str, mode: RecomposeMode) -> Result<Vec<u8>> {
    let doc = load_document(bytes)?;
    let pages = resolve_pages(expression, page_count(&doc))?;

    debug!(expression, selected = ?pages.to_vec(), ?mode, "Resolved page selection");

    recompose(&doc, &pages, mode)
}
