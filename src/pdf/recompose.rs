//! Page selection, deletion and rotation
//!
//! All three modes consume the same [`PageIndexSet`] and always emit pages in
//! their original document order.

use lopdf::{Document, Object};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::pdf::document::{page_ids, page_rotation, save_to_bytes};
use crate::range::PageIndexSet;

/// A clockwise page rotation, normalized to 0, 90, 180 or 270 degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation(i64);

impl Rotation {
    /// Accept any multiple of 90 (negative values rotate counter-clockwise)
    pub fn new(degrees: i64) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(Error::InvalidRotation(degrees));
        }
        Ok(Self(degrees.rem_euclid(360)))
    }

    /// Normalized degrees
    pub fn degrees(&self) -> i64 {
        self.0
    }

    /// Add this rotation to an existing /Rotate value
    fn apply_to(&self, existing: i64) -> i64 {
        (existing + self.0).rem_euclid(360)
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self(90)
    }
}

/// How a page selection is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomposeMode {
    /// Keep only the selected pages
    Extract,
    /// Drop the selected pages
    Delete,
    /// Rotate the selected pages, keep the rest unchanged
    Rotate(Rotation),
}

/// Apply a page selection to a document and serialize the result
///
/// # Example
///
/// ```no_run
/// use pdf_toolkit::pdf::{load_document, recompose, RecomposeMode};
/// use pdf_toolkit::range::resolve_pages;
///
/// let bytes = std::fs::read("input.pdf").unwrap();
/// let doc = load_document(&bytes).unwrap();
/// let pages = resolve_pages("1-3,5", doc.get_pages().len()).unwrap();
/// let split = recompose(&doc, &pages, RecomposeMode::Extract).unwrap();
/// ```
pub fn recompose(doc: &Document, pages: &PageIndexSet, mode: RecomposeMode) -> Result<Vec<u8>> {
    match mode {
        RecomposeMode::Extract => keep_pages(doc, |index| pages.contains(index)),
        RecomposeMode::Delete => keep_pages(doc, |index| !pages.contains(index)),
        RecomposeMode::Rotate(rotation) => {
            rotate_pages(doc, rotation, |index| pages.contains(index))
        }
    }
}

/// Rotate every page of the document
pub fn rotate_all(doc: &Document, rotation: Rotation) -> Result<Vec<u8>> {
    rotate_pages(doc, rotation, |_| true)
}

/// Build a copy of `doc` containing only the pages for which `keep` is true
fn keep_pages<F>(doc: &Document, keep: F) -> Result<Vec<u8>>
where
    F: Fn(usize) -> bool,
{
    let total = doc.get_pages().len();

    // lopdf page numbers are 1-based
    let to_delete: Vec<u32> = (0..total)
        .filter(|&index| !keep(index))
        .map(|index| index as u32 + 1)
        .collect();

    if to_delete.len() == total {
        return Err(Error::EmptyResult);
    }

    let mut new_doc = doc.clone();

    // Delete in reverse order so remaining page numbers stay valid
    for &page_num in to_delete.iter().rev() {
        new_doc.delete_pages(&[page_num]);
    }

    // Drop objects only the removed pages referenced
    new_doc.prune_objects();

    info!(kept = total - to_delete.len(), removed = to_delete.len(), "Recomposed document");

    save_to_bytes(&mut new_doc)
}

/// Rotate selected pages in place on a copy of `doc`
fn rotate_pages<F>(doc: &Document, rotation: Rotation, selected: F) -> Result<Vec<u8>>
where
    F: Fn(usize) -> bool,
{
    let mut new_doc = doc.clone();
    let mut rotated = 0;

    for (index, page_id) in page_ids(&new_doc).into_iter().enumerate() {
        if !selected(index) {
            continue;
        }

        let existing = page_rotation(&new_doc, page_id);
        let new_rotation = rotation.apply_to(existing);

        if let Object::Dictionary(ref mut page_dict) = new_doc.get_object_mut(page_id)? {
            page_dict.set("Rotate", Object::Integer(new_rotation));
        }

        debug!(page = index + 1, existing, new_rotation, "Rotated page");
        rotated += 1;
    }

    info!(rotated, degrees = rotation.degrees(), "Rotated pages");

    save_to_bytes(&mut new_doc)
}
