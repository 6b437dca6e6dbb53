//! Loading, inspecting and serializing documents
//!
//! Every operation in the toolkit starts from bytes and ends with bytes; this
//! module holds the shared plumbing around `lopdf::Document`.

use lopdf::{Dictionary, Document, Object, ObjectId};
use crate::error::{Error, Result};

/// Geometry fallback when a page tree carries no MediaBox at all (US Letter)
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Two geometries closer than this (in both dimensions) share an overlay
pub const GEOMETRY_TOLERANCE: f64 = 1.0;

/// Page width and height in PDF user units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether both dimensions are within [`GEOMETRY_TOLERANCE`] of `other`
    pub fn matches(&self, other: &PageGeometry) -> bool {
        (self.width - other.width).abs() <= GEOMETRY_TOLERANCE
            && (self.height - other.height).abs() <= GEOMETRY_TOLERANCE
    }
}

/// A page's MediaBox: lower-left origin plus size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x: f64,
    pub y: f64,
    pub geometry: PageGeometry,
}

/// Load a PDF from memory
///
/// Rejects encrypted documents and documents without pages.
pub fn load_document(bytes: &[u8]) -> Result<Document> {
    let doc = Document::load_mem(bytes)?;

    if doc.is_encrypted() {
        return Err(Error::EncryptedDocument);
    }

    if doc.get_pages().is_empty() {
        return Err(Error::EmptyPdf);
    }

    Ok(doc)
}

/// Page object IDs in document order
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Number of pages in the document
pub fn page_count(doc: &Document) -> usize {
    doc.get_pages().len()
}

/// Compress and serialize a document
pub fn save_to_bytes(doc: &mut Document) -> Result<Vec<u8>> {
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

/// Look up a page attribute, walking up the page tree for inheritable keys
///
/// MediaBox, Resources and Rotate may live on any ancestor `Pages` node.
/// References are resolved, so the returned object is never a `Reference`.
pub fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node_id = page_id;

    // Guard against cyclic Parent chains in broken files
    for _ in 0..64 {
        let node = doc.get_object(node_id).and_then(Object::as_dict).ok()?;

        if let Ok(value) = node.get(key) {
            return resolve(doc, value).cloned();
        }

        node_id = node.get(b"Parent").and_then(Object::as_reference).ok()?;
    }

    None
}

/// Follow a reference (if any) to the object it points at
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Read the page's MediaBox, inherited if necessary
pub fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let [x1, y1, x2, y2] = inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|media_box| parse_box_array(doc, &media_box))
        .unwrap_or(DEFAULT_MEDIA_BOX);

    PageBox {
        x: x1.min(x2),
        y: y1.min(y2),
        geometry: PageGeometry::new((x2 - x1).abs(), (y2 - y1).abs()),
    }
}

/// Page width and height from its MediaBox
pub fn page_geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    page_box(doc, page_id).geometry
}

/// Parse a box array [x1, y1, x2, y2]
fn parse_box_array(doc: &Document, object: &Object) -> Option<[f64; 4]> {
    let array = object.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let mut result = [0.0; 4];
    for (slot, element) in result.iter_mut().zip(array) {
        *slot = match resolve(doc, element)? {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => return None,
        };
    }

    Some(result)
}

/// Current page rotation in degrees, normalized to 0..360
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|rotate| rotate.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360)
}

/// The page's effective Resources dictionary, copied out of the document
///
/// Inherited and referenced dictionaries are resolved; a page without
/// resources yields an empty dictionary.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    }
}
