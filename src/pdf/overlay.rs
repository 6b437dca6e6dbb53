//! Image watermark overlays
//!
//! Converts a raster image into a single-page, translucent PDF sized for one
//! page geometry. The image is decoded and its alpha channel scaled once; each
//! call to [`OverlayBuilder::build`] then only lays the image out on a page of
//! the requested size.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbaImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::{Error, Result};
use crate::pdf::document::{save_to_bytes, PageGeometry};

/// Share of the page the image may cover along its constraining axis
const FIT_MARGIN: f64 = 0.8;

/// Resource name of the image inside the overlay page
const IMAGE_NAME: &str = "Im0";

/// Alpha multiplier applied to every pixel of a watermark image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Opacity(f64);

impl Opacity {
    /// Accept values in 0.0..=1.0
    pub fn new(value: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&value) {
            return Err(Error::InvalidOpacity(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for Opacity {
    fn default() -> Self {
        Self(0.3)
    }
}

/// Where the scaled image lands on the page (PDF coordinates, bottom-left origin)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Scale an image to fit inside the page with a margin, then center it
///
/// The scale factor is the smaller of the two axis ratios times 0.8, so the
/// aspect ratio is preserved and a border is left on the tighter axis.
pub fn fit_centered(image_width: u32, image_height: u32, page: PageGeometry) -> Placement {
    let image_width = f64::from(image_width);
    let image_height = f64::from(image_height);

    let scale = (page.width / image_width).min(page.height / image_height) * FIT_MARGIN;

    let width = image_width * scale;
    let height = image_height * scale;

    Placement {
        x: (page.width - width) / 2.0,
        y: (page.height - height) / 2.0,
        width,
        height,
    }
}

/// A rendered single-page overlay for one page geometry
#[derive(Debug, Clone)]
pub struct Overlay {
    /// Geometry the overlay page was built for
    pub geometry: PageGeometry,
    /// The one-page overlay document
    pub document: Document,
}

impl Overlay {
    /// Serialize the overlay document
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut doc = self.document.clone();
        save_to_bytes(&mut doc)
    }
}

/// Builds overlays from one decoded, alpha-adjusted source image
#[derive(Debug, Clone)]
pub struct OverlayBuilder {
    image: RgbaImage,
    opacity: Opacity,
}

impl OverlayBuilder {
    /// Decode an image and apply the opacity to its alpha channel
    ///
    /// Images without alpha get a fully opaque channel first. Decode failures
    /// surface as [`Error::OverlayConstruction`].
    pub fn new(image_bytes: &[u8], opacity: Opacity) -> Result<Self> {
        let decoded = image::load_from_memory(image_bytes).map_err(Error::overlay)?;

        let mut image = decoded.to_rgba8();
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::overlay("image has no pixels"));
        }

        apply_opacity(&mut image, opacity);

        debug!(
            width = image.width(),
            height = image.height(),
            opacity = opacity.value(),
            "Prepared watermark image"
        );

        Ok(Self { image, opacity })
    }

    pub fn opacity(&self) -> Opacity {
        self.opacity
    }

    /// Render a one-page overlay of exactly `geometry`
    pub fn build(&self, geometry: PageGeometry) -> Result<Overlay> {
        if !(geometry.width > 0.0 && geometry.height > 0.0) {
            return Err(Error::overlay(format!(
                "page size {}x{} cannot hold an image",
                geometry.width, geometry.height
            )));
        }

        let placement = fit_centered(self.image.width(), self.image.height(), geometry);
        let document = render_overlay_page(&self.image, geometry, placement)?;

        debug!(
            page_width = geometry.width,
            page_height = geometry.height,
            x = placement.x,
            y = placement.y,
            "Built watermark overlay"
        );

        Ok(Overlay { geometry, document })
    }
}

/// Build a serialized overlay PDF from image bytes in one step
pub fn build_overlay(image_bytes: &[u8], geometry: PageGeometry, opacity: Opacity) -> Result<Vec<u8>> {
    OverlayBuilder::new(image_bytes, opacity)?
        .build(geometry)?
        .to_bytes()
}

/// Multiply every alpha value by the opacity, truncating toward zero
fn apply_opacity(image: &mut RgbaImage, opacity: Opacity) {
    let factor = opacity.value();
    for pixel in image.pixels_mut() {
        pixel.0[3] = (f64::from(pixel.0[3]) * factor) as u8;
    }
}

/// Draw the image onto a fresh page of the given size
fn render_overlay_page(image: &RgbaImage, geometry: PageGeometry, placement: Placement) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = add_image_xobject(&mut doc, image)?;

    let mut xobjects = Dictionary::new();
    xobjects.set(IMAGE_NAME, Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let content = format!(
        "q\n{:.4} 0 0 {:.4} {:.4} {:.4} cm\n/{} Do\nQ\n",
        placement.width, placement.height, placement.x, placement.y, IMAGE_NAME
    );
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set("MediaBox", Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Real(geometry.width as f32),
        Object::Real(geometry.height as f32),
    ]));
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(content_id));
    let page_id = doc.add_object(page);

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
    pages.set("Count", Object::Integer(1));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    Ok(doc)
}

/// Embed RGBA pixels as an RGB image XObject with an alpha soft mask
fn add_image_xobject(doc: &mut Document, image: &RgbaImage) -> Result<ObjectId> {
    let (width, height) = image.dimensions();

    // Separate RGB and alpha channels
    let mut rgb_data = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha_data = Vec::with_capacity((width * height) as usize);
    for pixel in image.pixels() {
        rgb_data.extend_from_slice(&pixel.0[..3]);
        alpha_data.push(pixel.0[3]);
    }

    let mut smask_dict = image_dict(width, height, b"DeviceGray");
    let smask_data = deflate(&alpha_data)?;
    smask_dict.set("Length", Object::Integer(smask_data.len() as i64));
    let smask_id = doc.add_object(Stream::new(smask_dict, smask_data).with_compression(false));

    let mut image_dict = image_dict(width, height, b"DeviceRGB");
    let image_data = deflate(&rgb_data)?;
    image_dict.set("Length", Object::Integer(image_data.len() as i64));
    image_dict.set("SMask", Object::Reference(smask_id));
    let image_id = doc.add_object(Stream::new(image_dict, image_data).with_compression(false));

    Ok(image_id)
}

fn image_dict(width: u32, height: u32, color_space: &[u8]) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    dict
}

/// Zlib-compress raw samples for a FlateDecode stream
fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(Error::overlay)?;
    encoder.finish().map_err(Error::overlay)
}
