//! Watermark compositing
//!
//! Stamps an overlay page on top of every page of a document. Overlays built
//! from images are sized per page geometry, and a [`GeometryCache`] makes sure
//! consecutive pages of the same size share one overlay instead of
//! rebuilding it for every page.
//!
//! Each overlay is imported into the target document once, as a Form XObject,
//! and reused when a later page returns to a size already seen.
//! Pages then get:
//! 1. their original content wrapped in `q`/`Q`, so leftover transformations
//!    cannot displace the overlay
//! 2. the Form XObject registered under a free resource name
//! 3. an appended content stream that draws it at the page's origin

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::pdf::document::{
    load_document, page_box, page_ids, page_resources, resolve, save_to_bytes, PageGeometry,
};
use crate::pdf::merge::import_objects;
use crate::pdf::overlay::{Opacity, Overlay, OverlayBuilder};

/// File extensions accepted as image watermarks
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

/// What gets stamped onto the pages
#[derive(Debug, Clone)]
pub enum OverlaySource {
    /// Encoded raster image, turned into a translucent overlay per page size
    Image(Vec<u8>),
    /// A ready-made overlay document; its first page is stamped as is
    RenderedPage(Document),
}

impl OverlaySource {
    /// Pick the source variant from a file extension
    ///
    /// `pdf` loads the bytes as a document right away; image extensions keep
    /// the bytes for decoding by the overlay builder.
    pub fn from_extension(extension: &str, bytes: Vec<u8>) -> Result<Self> {
        let extension = extension.to_ascii_lowercase();

        if extension == "pdf" {
            return Ok(OverlaySource::RenderedPage(load_document(&bytes)?));
        }

        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Ok(OverlaySource::Image(bytes));
        }

        Err(Error::UnsupportedOverlay(extension))
    }
}

/// Options for watermarking
#[derive(Debug, Clone, Copy, Default)]
pub struct WatermarkOptions {
    /// Alpha multiplier for image watermarks (default 0.3)
    pub opacity: Opacity,
}

/// The page geometry the current overlay was built for
///
/// Starts empty. A lookup hits when the cached geometry is within one unit of
/// the requested one in both dimensions.
#[derive(Debug, Clone, Default)]
pub struct GeometryCache<T> {
    current: Option<(PageGeometry, T)>,
}

impl<T> GeometryCache<T> {
    pub fn new() -> Self {
        Self { current: None }
    }

    /// The cached value if it was built for a matching geometry
    pub fn get(&self, geometry: &PageGeometry) -> Option<&T> {
        match &self.current {
            Some((cached, value)) if cached.matches(geometry) => Some(value),
            _ => None,
        }
    }

    /// Replace the cached value
    pub fn insert(&mut self, geometry: PageGeometry, value: T) {
        self.current = Some((geometry, value));
    }

    /// Geometry of the cached value, if any
    pub fn geometry(&self) -> Option<PageGeometry> {
        self.current.as_ref().map(|(geometry, _)| *geometry)
    }
}

/// An overlay page imported into the target document
#[derive(Debug, Clone, Copy)]
struct Stamp {
    xobject_id: ObjectId,
    /// Lower-left corner of the overlay page's box
    origin: (f64, f64),
}

/// Composites image overlays onto documents, rebuilding only on size changes
#[derive(Debug)]
pub struct WatermarkCompositor {
    builder: OverlayBuilder,
    overlays_built: usize,
}

impl WatermarkCompositor {
    /// Decode the watermark image once
    pub fn new(image_bytes: &[u8], opacity: Opacity) -> Result<Self> {
        Ok(Self {
            builder: OverlayBuilder::new(image_bytes, opacity)?,
            overlays_built: 0,
        })
    }

    /// Number of overlays built so far
    pub fn overlays_built(&self) -> usize {
        self.overlays_built
    }

    /// Stamp a size-matched overlay on every page of `doc`
    pub fn apply(&mut self, doc: &mut Document) -> Result<()> {
        // Stamps hold object IDs of this document, so the cache lives per call
        let mut cache: GeometryCache<Stamp> = GeometryCache::new();
        // Every overlay imported so far; a size seen before reuses its XObject
        let mut imported: Vec<(PageGeometry, Stamp)> = Vec::new();

        for (index, page_id) in page_ids(doc).into_iter().enumerate() {
            let geometry = page_box(doc, page_id).geometry;

            let stamp = match cache.get(&geometry) {
                Some(stamp) => *stamp,
                None => {
                    debug!(
                        page = index + 1,
                        width = geometry.width,
                        height = geometry.height,
                        previous = ?cache.geometry(),
                        "Page size changed, building new overlay"
                    );
                    let overlay = self.build(geometry)?;
                    let seen = imported
                        .iter()
                        .find(|(seen, _)| seen.matches(&geometry))
                        .map(|(_, stamp)| *stamp);
                    let stamp = match seen {
                        Some(stamp) => stamp,
                        None => {
                            let stamp = import_overlay_page(doc, &overlay.document)?;
                            imported.push((geometry, stamp));
                            stamp
                        }
                    };
                    cache.insert(geometry, stamp);
                    stamp
                }
            };

            stamp_page(doc, page_id, &stamp)?;
        }

        info!(overlays_built = self.overlays_built, "Applied image watermark");

        Ok(())
    }

    fn build(&mut self, geometry: PageGeometry) -> Result<Overlay> {
        let overlay = self.builder.build(geometry)?;
        self.overlays_built += 1;
        Ok(overlay)
    }
}

/// Stamp the first page of `overlay` onto every page of `doc`
///
/// No scaling happens here: the overlay page is drawn at each page's origin
/// at its own size, whatever the target page size is.
pub fn apply_rendered_page(doc: &mut Document, overlay: &Document) -> Result<()> {
    let stamp = import_overlay_page(doc, overlay)?;

    let pages = page_ids(doc);
    for &page_id in &pages {
        stamp_page(doc, page_id, &stamp)?;
    }

    info!(pages = pages.len(), "Applied page watermark");

    Ok(())
}

/// Watermark a document and serialize it
///
/// # Example
///
/// ```no_run
/// use pdf_toolkit::pdf::{composite_watermark, load_document, OverlaySource, WatermarkOptions};
///
/// let doc = load_document(&std::fs::read("input.pdf").unwrap()).unwrap();
/// let logo = OverlaySource::from_extension("png", std::fs::read("logo.png").unwrap()).unwrap();
/// let output = composite_watermark(doc, &logo, &WatermarkOptions::default()).unwrap();
/// ```
pub fn composite_watermark(
    mut doc: Document,
    source: &OverlaySource,
    options: &WatermarkOptions,
) -> Result<Vec<u8>> {
    match source {
        OverlaySource::Image(bytes) => {
            WatermarkCompositor::new(bytes, options.opacity)?.apply(&mut doc)?;
        }
        OverlaySource::RenderedPage(overlay) => {
            apply_rendered_page(&mut doc, overlay)?;
        }
    }

    save_to_bytes(&mut doc)
}

/// Import the first page of `overlay` into `doc` as a Form XObject
fn import_overlay_page(doc: &mut Document, overlay: &Document) -> Result<Stamp> {
    let page_id = *overlay.get_pages().values().next().ok_or(Error::EmptyPdf)?;

    let overlay_box = page_box(overlay, page_id);
    let content = overlay.get_page_content(page_id)?;
    let resources = Object::Dictionary(page_resources(overlay, page_id));

    let imported = import_objects(doc, overlay, &[resources])?;
    let resources = imported.into_iter().next().unwrap_or_else(|| Object::Dictionary(Dictionary::new()));

    let xobject_id = create_form_xobject(doc, content, resources, overlay_box.x, overlay_box.y, overlay_box.geometry);

    Ok(Stamp {
        xobject_id,
        origin: (overlay_box.x, overlay_box.y),
    })
}

/// Create a Form XObject whose bounding box is the overlay page's box
fn create_form_xobject(
    doc: &mut Document,
    content: Vec<u8>,
    resources: Object,
    x: f64,
    y: f64,
    geometry: PageGeometry,
) -> ObjectId {
    let mut xobject_dict = Dictionary::new();
    xobject_dict.set("Type", Object::Name(b"XObject".to_vec()));
    xobject_dict.set("Subtype", Object::Name(b"Form".to_vec()));
    xobject_dict.set("FormType", Object::Integer(1));
    xobject_dict.set("BBox", Object::Array(vec![
        Object::Real(x as f32),
        Object::Real(y as f32),
        Object::Real((x + geometry.width) as f32),
        Object::Real((y + geometry.height) as f32),
    ]));
    xobject_dict.set("Matrix", Object::Array(vec![
        Object::Integer(1),
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(1),
        Object::Integer(0),
        Object::Integer(0),
    ]));
    xobject_dict.set("Resources", resources);

    doc.add_object(Stream::new(xobject_dict, content))
}

/// Draw a stamp on top of one page
fn stamp_page(doc: &mut Document, page_id: ObjectId, stamp: &Stamp) -> Result<()> {
    let target = page_box(doc, page_id);

    isolate_page_content(doc, page_id)?;

    let name = add_xobject_to_page_resources(doc, page_id, stamp.xobject_id)?;

    // Line the overlay's box up with the page's box
    let dx = target.x - stamp.origin.0;
    let dy = target.y - stamp.origin.1;
    let invoke_content = format!("q\n1 0 0 1 {:.4} {:.4} cm\n/{} Do\nQ\n", dx, dy, name);
    let content_stream_id = doc.add_object(Stream::new(Dictionary::new(), invoke_content.into_bytes()));

    append_content_to_page(doc, page_id, content_stream_id)
}

/// Register an XObject on the page under a name the page does not use yet
///
/// The page ends up with its own direct Resources dictionary, so pages that
/// shared (or inherited) resources are not affected by each other.
fn add_xobject_to_page_resources(doc: &mut Document, page_id: ObjectId, xobject_id: ObjectId) -> Result<String> {
    let mut resources = page_resources(doc, page_id);

    let mut xobjects = match resources.get(b"XObject").ok().and_then(|xo| resolve(doc, xo)) {
        Some(Object::Dictionary(xo)) => xo.clone(),
        _ => Dictionary::new(),
    };

    let name = (0..)
        .map(|n| format!("Wm{}", n))
        .find(|candidate| !xobjects.has(candidate.as_bytes()))
        .unwrap_or_else(|| "Wm".to_string());

    xobjects.set(name.as_bytes().to_vec(), Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    if let Object::Dictionary(ref mut page_dict) = doc.get_object_mut(page_id)? {
        page_dict.set("Resources", Object::Dictionary(resources));
    }

    Ok(name)
}

/// Wrap the page's existing content in a q/Q pair
///
/// Original content that leaves a transformation or clip active would
/// otherwise apply it to everything appended afterwards.
fn isolate_page_content(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

    prepend_content_to_page(doc, page_id, save_id)?;
    append_content_to_page(doc, page_id, restore_id)
}

/// Content stream references of a page, flattened into a list
///
/// `Contents` may be a single stream reference, a direct array, or a
/// reference to an array object.
fn page_content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page_dict = doc.get_object(page_id)?.as_dict()?;

    let refs = match page_dict.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(arr)) => arr.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(arr)) => arr.clone(),
        _ => vec![],
    };

    Ok(refs)
}

/// Prepend a content stream to a page's Contents
fn prepend_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let mut contents = page_content_refs(doc, page_id)?;
    contents.insert(0, Object::Reference(new_content_id));
    set_page_contents(doc, page_id, contents)
}

/// Append a content stream to a page's Contents
///
/// Appended content is drawn after the original, i.e. on top of it.
fn append_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let mut contents = page_content_refs(doc, page_id)?;
    contents.push(Object::Reference(new_content_id));
    set_page_contents(doc, page_id, contents)
}

fn set_page_contents(doc: &mut Document, page_id: ObjectId, contents: Vec<Object>) -> Result<()> {
    if let Object::Dictionary(ref mut page_dict) = doc.get_object_mut(page_id)? {
        page_dict.set("Contents", Object::Array(contents));
    }
    Ok(())
}
