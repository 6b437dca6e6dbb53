//! PDF merging and cross-document object import using lopdf

use std::collections::{BTreeMap, HashMap};
use lopdf::{Document, Object, ObjectId, Dictionary};
use tracing::info;
use crate::error::{Error, Result};
use crate::pdf::document::{inherited_attribute, load_document, save_to_bytes};

/// Page attributes a page may inherit from its page tree ancestors
const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"Resources", b"Rotate", b"CropBox"];

/// Merge multiple PDF documents into a single PDF
///
/// Pages appear in the order the inputs are given. Based on the lopdf merge
/// example: https://github.com/J-F-Liu/lopdf/blob/main/examples/merge.rs
///
/// # Example
///
/// ```no_run
/// use pdf_toolkit::pdf::merge_documents;
///
/// let first = std::fs::read("1. first.pdf").unwrap();
/// let second = std::fs::read("2. second.pdf").unwrap();
/// let merged = merge_documents(&[first, second]).expect("Failed to merge");
/// ```
pub fn merge_documents<B: AsRef<[u8]>>(inputs: &[B]) -> Result<Vec<u8>> {
    if inputs.is_empty() {
        return Err(Error::General("No input files provided".to_string()));
    }

    // Load and validate all documents first
    let documents = inputs
        .iter()
        .map(|bytes| load_document(bytes.as_ref()))
        .collect::<Result<Vec<Document>>>()?;

    // Define a starting max_id for merged document
    let mut max_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        // Renumber objects in this document to avoid conflicts
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        page_ids.extend(doc.get_pages().into_values());

        // The old catalogs and page tree roots are dropped by prune_objects below
        objects.extend(doc.objects);
    }

    let mut merged_doc = Document::with_version("1.5");
    merged_doc.objects.extend(objects);

    // Keep new_object_id() above every imported ID
    merged_doc.max_id = max_id - 1;

    let pages_id = merged_doc.new_object_id();

    let kids: Vec<Object> = page_ids
        .iter()
        .map(|&id| Object::Reference(id))
        .collect();

    let mut pages_object = Dictionary::new();
    pages_object.set("Type", Object::Name(b"Pages".to_vec()));
    pages_object.set("Count", Object::Integer(page_ids.len() as i64));
    pages_object.set("Kids", Object::Array(kids));

    let catalog_id = merged_doc.new_object_id();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    merged_doc.objects.insert(catalog_id, Object::Dictionary(catalog));
    merged_doc.objects.insert(pages_id, Object::Dictionary(pages_object));
    merged_doc.trailer.set("Root", Object::Reference(catalog_id));

    // Re-parent every page onto the new page tree. Attributes the old
    // intermediate nodes passed down are copied onto the page first.
    for &page_id in &page_ids {
        let inherited: Vec<(&[u8], Object)> = INHERITABLE_KEYS
            .into_iter()
            .filter_map(|key| inherited_attribute(&merged_doc, page_id, key).map(|value| (key, value)))
            .collect();

        if let Ok(Object::Dictionary(ref mut dict)) = merged_doc.get_object_mut(page_id) {
            for (key, value) in inherited {
                if !dict.has(key) {
                    dict.set(key.to_vec(), value);
                }
            }
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    merged_doc.prune_objects();

    info!(inputs = inputs.len(), pages = page_ids.len(), "Merged documents");

    save_to_bytes(&mut merged_doc)
}

/// Copy objects reachable from `roots` out of `source` into `target`
///
/// Every reachable object gets a fresh ID in `target` and all references are
/// rewritten. `Parent` links are not followed, so importing a page's content
/// and resources never drags in the source page tree. Returns the roots with
/// their references renumbered.
pub(crate) fn import_objects(target: &mut Document, source: &Document, roots: &[Object]) -> Result<Vec<Object>> {
    // Collect reachable object IDs
    let mut pending: Vec<ObjectId> = Vec::new();
    for root in roots {
        collect_references(root, &mut pending);
    }

    let mut id_map: HashMap<ObjectId, ObjectId> = HashMap::new();
    let mut order: Vec<ObjectId> = Vec::new();
    while let Some(old_id) = pending.pop() {
        if id_map.contains_key(&old_id) {
            continue;
        }
        let Ok(object) = source.get_object(old_id) else {
            // Dangling reference, renumbered to null below
            continue;
        };
        id_map.insert(old_id, target.new_object_id());
        order.push(old_id);
        collect_references(object, &mut pending);
    }

    // Now copy all objects, renumbering references
    for old_id in order {
        let object = source.get_object(old_id)?;
        target.objects.insert(id_map[&old_id], renumber_object_references(object, &id_map));
    }

    Ok(roots.iter().map(|root| renumber_object_references(root, &id_map)).collect())
}

/// Push every reference held by `object` (except Parent links)
fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(arr) => arr.iter().for_each(|obj| collect_references(obj, out)),
        Object::Dictionary(dict) => collect_dictionary_references(dict, out),
        Object::Stream(stream) => collect_dictionary_references(&stream.dict, out),
        _ => {}
    }
}

fn collect_dictionary_references(dict: &Dictionary, out: &mut Vec<ObjectId>) {
    for (key, value) in dict.iter() {
        if key.as_slice() != b"Parent" {
            collect_references(value, out);
        }
    }
}

/// Renumber all object references in an object
///
/// References missing from `id_map` point at nothing in the source and
/// become null, which is how PDF readers treat them anyway.
fn renumber_object_references(object: &Object, id_map: &HashMap<ObjectId, ObjectId>) -> Object {
    match object {
        Object::Reference(old_id) => match id_map.get(old_id) {
            Some(new_id) => Object::Reference(*new_id),
            None => Object::Null,
        },
        Object::Array(arr) => {
            Object::Array(arr.iter().map(|obj| renumber_object_references(obj, id_map)).collect())
        }
        Object::Dictionary(dict) => Object::Dictionary(renumber_dictionary(dict, id_map)),
        Object::Stream(stream) => {
            let mut new_stream = stream.clone();
            new_stream.dict = renumber_dictionary(&stream.dict, id_map);
            Object::Stream(new_stream)
        }
        _ => object.clone(),
    }
}

fn renumber_dictionary(dict: &Dictionary, id_map: &HashMap<ObjectId, ObjectId>) -> Dictionary {
    let mut new_dict = Dictionary::new();
    for (key, value) in dict.iter() {
        new_dict.set(key.clone(), renumber_object_references(value, id_map));
    }
    new_dict
}
