//! Integration tests for the PDF toolkit library
//!
//! All documents are generated in memory with lopdf, so no fixtures are
//! needed.

use std::io::Cursor;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pdf_toolkit::pdf::{
    build_overlay, composite_watermark, fit_centered, load_document, merge_documents, Opacity,
    OverlaySource, PageGeometry, WatermarkCompositor, WatermarkOptions,
};
use pdf_toolkit::toolkit::{self, RotateTarget};
use pdf_toolkit::Error;

/// A page to generate: MediaBox size and an optional /Rotate entry
#[derive(Clone, Copy)]
struct TestPage {
    width: i64,
    height: i64,
    rotate: Option<i64>,
}

impl TestPage {
    fn letter() -> Self {
        Self { width: 612, height: 792, rotate: None }
    }

    fn sized(width: i64, height: i64) -> Self {
        Self { width, height, rotate: None }
    }
}

/// Build a document whose page N draws the text "Page N"
fn build_pdf(pages: &[TestPage]) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    let font_id = doc.add_object(font);

    let mut kids = Vec::new();
    for (i, test_page) in pages.iter().enumerate() {
        let content = format!("BT /F1 12 Tf 72 700 Td (Page {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        page.set("Resources", Object::Dictionary(resources));
        page.set("MediaBox", Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(test_page.width as f32),
            Object::Real(test_page.height as f32),
        ]));
        if let Some(rotate) = test_page.rotate {
            page.set("Rotate", Object::Integer(rotate));
        }

        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(kids.len() as i64));
    pages_dict.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    doc
}

fn to_bytes(mut doc: Document) -> Vec<u8> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("Failed to save test PDF");
    buffer
}

fn letter_pdf(page_count: usize) -> Vec<u8> {
    to_bytes(build_pdf(&vec![TestPage::letter(); page_count]))
}

fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// The "Page N" labels of a document, in page order
fn page_labels(bytes: &[u8]) -> Vec<usize> {
    let doc = Document::load_mem(bytes).expect("Output should be a valid PDF");
    page_ids(&doc)
        .into_iter()
        .map(|page_id| {
            let content = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();
            let start = content.find("(Page ").expect("Page label missing") + "(Page ".len();
            let end = start + content[start..].find(')').unwrap();
            content[start..end].parse().unwrap()
        })
        .collect()
}

fn rotations(bytes: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(bytes).unwrap();
    page_ids(&doc)
        .into_iter()
        .map(|page_id| {
            doc.get_dictionary(page_id)
                .unwrap()
                .get(b"Rotate")
                .and_then(Object::as_i64)
                .unwrap_or(0)
        })
        .collect()
}

/// Object ID of the Form XObject a page draws as `/Wm0`
fn watermark_xobject(doc: &Document, page_id: ObjectId) -> ObjectId {
    let page = doc.get_dictionary(page_id).unwrap();
    let resources = page.get(b"Resources").and_then(Object::as_dict).unwrap();
    let xobjects = resources.get(b"XObject").and_then(Object::as_dict).unwrap();
    xobjects.get(b"Wm0").and_then(Object::as_reference).unwrap()
}

fn floats(object: &Object) -> Vec<f32> {
    object
        .as_array()
        .unwrap()
        .iter()
        .map(|value| value.as_float().unwrap())
        .collect()
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 30, 30, 255]));
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    buffer.into_inner()
}

#[test]
fn test_split_keeps_selected_pages_in_order() {
    let input = letter_pdf(10);

    // 20 is out of range and silently dropped
    let output = toolkit::split(&input, "1-3,7,20").unwrap();

    assert_eq!(page_labels(&output), vec![1, 2, 3, 7]);
}

#[test]
fn test_split_ignores_token_order_and_duplicates() {
    let input = letter_pdf(6);

    let output = toolkit::split(&input, "5, 2,2 , 4-5,").unwrap();

    assert_eq!(page_labels(&output), vec![2, 4, 5]);
}

#[test]
fn test_split_and_delete_are_complementary() {
    let input = letter_pdf(8);
    let expression = "2-4,8";

    let kept = page_labels(&toolkit::split(&input, expression).unwrap());
    let remaining = page_labels(&toolkit::delete_pages(&input, expression).unwrap());

    assert_eq!(kept, vec![2, 3, 4, 8]);
    assert_eq!(remaining, vec![1, 5, 6, 7]);

    let mut all: Vec<usize> = kept.into_iter().chain(remaining).collect();
    all.sort();
    assert_eq!(all, (1..=8).collect::<Vec<_>>());
}

#[test]
fn test_delete_every_page_is_rejected() {
    let input = letter_pdf(5);

    let result = toolkit::delete_pages(&input, "1-5");
    assert!(matches!(result, Err(Error::EmptyResult)));
}

#[test]
fn test_no_valid_pages_is_rejected() {
    let input = letter_pdf(5);

    for expression in ["5-1", "0", "6-9", "abc", "", " , ,"] {
        let result = toolkit::split(&input, expression);
        assert!(
            matches!(result, Err(Error::NoValidPages)),
            "expected NoValidPages for {:?}",
            expression
        );
    }

    assert!(matches!(toolkit::delete_pages(&input, "9"), Err(Error::NoValidPages)));
    assert!(matches!(
        toolkit::rotate(&input, RotateTarget::Pages("0-0"), 90),
        Err(Error::NoValidPages)
    ));
}

#[test]
fn test_rotate_selected_pages_only() {
    let input = letter_pdf(4);

    let output = toolkit::rotate(&input, RotateTarget::Pages("2,4"), 90).unwrap();

    assert_eq!(rotations(&output), vec![0, 90, 0, 90]);
    assert_eq!(page_labels(&output), vec![1, 2, 3, 4]);
}

#[test]
fn test_rotate_all_adds_to_existing_rotation() {
    let pages = [
        TestPage::letter(),
        TestPage { rotate: Some(90), ..TestPage::letter() },
        TestPage { rotate: Some(270), ..TestPage::letter() },
    ];
    let input = to_bytes(build_pdf(&pages));

    let output = toolkit::rotate(&input, RotateTarget::All, 180).unwrap();
    assert_eq!(rotations(&output), vec![180, 270, 90]);

    let output = toolkit::rotate(&input, RotateTarget::All, -90).unwrap();
    assert_eq!(rotations(&output), vec![270, 0, 180]);
}

#[test]
fn test_rotate_rejects_non_right_angles() {
    let input = letter_pdf(2);

    assert!(matches!(
        toolkit::rotate(&input, RotateTarget::All, 45),
        Err(Error::InvalidRotation(45))
    ));
}

#[test]
fn test_invalid_document_is_rejected() {
    let result = toolkit::split(b"not a pdf", "1");
    assert!(matches!(result, Err(Error::Pdf(_))));
    assert_eq!(result.unwrap_err().code(), "invalid_pdf");
}

#[test]
fn test_overlay_fits_and_centers_image() {
    let cases = [
        // (image w, h, page w, h)
        (300, 100, 612.0, 792.0),
        (100, 300, 612.0, 792.0),
        (500, 500, 842.0, 595.0),
        (10, 1000, 200.0, 200.0),
    ];

    for (img_w, img_h, page_w, page_h) in cases {
        let page = PageGeometry::new(page_w, page_h);
        let placement = fit_centered(img_w, img_h, page);

        let scale = (page_w / img_w as f64).min(page_h / img_h as f64) * 0.8;
        assert!((placement.width - img_w as f64 * scale).abs() < 1e-9);
        assert!((placement.height - img_h as f64 * scale).abs() < 1e-9);

        // Centered, inside the page
        assert!((placement.x * 2.0 + placement.width - page_w).abs() < 1e-9);
        assert!((placement.y * 2.0 + placement.height - page_h).abs() < 1e-9);
        assert!(placement.x >= 0.0 && placement.y >= 0.0);

        // Aspect ratio preserved
        let expected_ratio = img_w as f64 / img_h as f64;
        assert!((placement.width / placement.height - expected_ratio).abs() < 1e-9);
    }
}

#[test]
fn test_build_overlay_produces_single_page_of_page_size() {
    let bytes = build_overlay(&png_bytes(40, 20), PageGeometry::new(842.0, 595.0), Opacity::default()).unwrap();

    let doc = load_document(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);

    let page_id = page_ids(&doc)[0];
    let geometry = pdf_toolkit::pdf::page_geometry(&doc, page_id);
    assert!(geometry.matches(&PageGeometry::new(842.0, 595.0)));
}

#[test]
fn test_compositor_builds_once_for_uniform_pages() {
    let mut doc = build_pdf(&vec![TestPage::letter(); 6]);
    let mut compositor = WatermarkCompositor::new(&png_bytes(30, 10), Opacity::default()).unwrap();

    compositor.apply(&mut doc).unwrap();

    assert_eq!(compositor.overlays_built(), 1);
}

#[test]
fn test_compositor_rebuilds_only_on_size_change() {
    let mut doc = build_pdf(&[
        TestPage::sized(612, 792),
        TestPage::sized(612, 792),
        TestPage::sized(842, 595),
        TestPage { width: 842, height: 595, rotate: Some(90) },
        TestPage::sized(612, 792),
    ]);
    // Within tolerance of the preceding page
    let fourth = page_ids(&doc)[3];
    if let Ok(Object::Dictionary(page)) = doc.get_object_mut(fourth) {
        page.set("MediaBox", Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(842.0),
            Object::Real(595.5),
        ]));
    }

    let mut compositor = WatermarkCompositor::new(&png_bytes(30, 10), Opacity::default()).unwrap();
    compositor.apply(&mut doc).unwrap();

    assert_eq!(compositor.overlays_built(), 3);
}

#[test]
fn test_compositor_reuses_imported_overlay_for_repeated_sizes() {
    let mut doc = build_pdf(&[
        TestPage::sized(612, 792),
        TestPage::sized(842, 595),
        TestPage::sized(612, 792),
        TestPage::sized(842, 595),
    ]);

    let mut compositor = WatermarkCompositor::new(&png_bytes(30, 10), Opacity::default()).unwrap();
    compositor.apply(&mut doc).unwrap();

    // Every size change still rebuilds
    assert_eq!(compositor.overlays_built(), 4);

    let forms: Vec<ObjectId> = page_ids(&doc)
        .into_iter()
        .map(|page_id| watermark_xobject(&doc, page_id))
        .collect();
    assert_eq!(forms[0], forms[2]);
    assert_eq!(forms[1], forms[3]);
    assert_ne!(forms[0], forms[1]);

    // One RGB image per distinct size, not one per rebuild
    let rgb_images = doc
        .objects
        .values()
        .filter_map(|object| object.as_stream().ok())
        .filter(|stream| {
            stream.dict.get(b"ColorSpace").and_then(Object::as_name).ok() == Some(b"DeviceRGB".as_slice())
        })
        .count();
    assert_eq!(rgb_images, 2);
}

#[test]
fn test_watermark_stamps_every_page() {
    let input = letter_pdf(3);
    let source = OverlaySource::from_extension("png", png_bytes(30, 10)).unwrap();

    let output = toolkit::watermark(&input, &source, &WatermarkOptions::default()).unwrap();

    let doc = load_document(&output).unwrap();
    assert_eq!(doc.get_pages().len(), 3);

    for page_id in page_ids(&doc) {
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").and_then(Object::as_dict).unwrap();
        let xobjects = resources.get(b"XObject").and_then(Object::as_dict).unwrap();
        assert!(xobjects.has(b"Wm0"));

        // Original resources survive next to the watermark
        assert!(resources.has(b"Font"));

        let content = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();
        assert!(content.starts_with("q\n"));
        assert!(content.contains("/Wm0 Do"));
    }

    assert_eq!(page_labels(&output), vec![1, 2, 3]);
}

#[test]
fn test_watermark_from_rendered_page() {
    let input = letter_pdf(2);
    let overlay = to_bytes(build_pdf(&[TestPage::letter()]));
    let source = OverlaySource::from_extension("PDF", overlay).unwrap();

    let output = composite_watermark(load_document(&input).unwrap(), &source, &WatermarkOptions::default()).unwrap();

    let doc = load_document(&output).unwrap();
    for page_id in page_ids(&doc) {
        let content = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();
        assert!(content.contains("/Wm0 Do"));
    }
}

#[test]
fn test_rendered_page_is_stamped_unscaled() {
    let input = letter_pdf(2);
    let overlay = to_bytes(build_pdf(&[TestPage::sized(200, 100)]));
    let source = OverlaySource::from_extension("pdf", overlay).unwrap();

    let output = toolkit::watermark(&input, &source, &WatermarkOptions::default()).unwrap();

    let doc = load_document(&output).unwrap();
    for page_id in page_ids(&doc) {
        let geometry = pdf_toolkit::pdf::page_geometry(&doc, page_id);
        assert!(geometry.matches(&PageGeometry::new(612.0, 792.0)));

        let form = doc
            .get_object(watermark_xobject(&doc, page_id))
            .and_then(Object::as_stream)
            .unwrap();
        assert_eq!(floats(form.dict.get(b"BBox").unwrap()), vec![0.0, 0.0, 200.0, 100.0]);
        assert_eq!(
            floats(form.dict.get(b"Matrix").unwrap()),
            vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
        );

        // Plain translation to the page origin, no scale factor
        let content = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();
        assert!(content.contains("q\n1 0 0 1 0.0000 0.0000 cm\n/Wm0 Do\nQ\n"));
    }
}

#[test]
fn test_watermark_rejects_undecodable_image() {
    let input = letter_pdf(1);
    let source = OverlaySource::from_extension("png", b"not an image".to_vec()).unwrap();

    let result = toolkit::watermark(&input, &source, &WatermarkOptions::default());
    assert!(matches!(result, Err(Error::OverlayConstruction { .. })));
}

#[test]
fn test_merge_preserves_input_order() {
    let first = letter_pdf(2);
    let second = to_bytes(build_pdf(&[TestPage::sized(842, 595); 3]));

    let merged = merge_documents(&[first, second]).unwrap();

    assert_eq!(page_labels(&merged), vec![1, 2, 1, 2, 3]);

    let doc = load_document(&merged).unwrap();
    let ids = page_ids(&doc);
    let geometry = pdf_toolkit::pdf::page_geometry(&doc, ids[4]);
    assert!(geometry.matches(&PageGeometry::new(842.0, 595.0)));
}

#[test]
fn test_toolkit_merge_concatenates_inputs() {
    let merged = toolkit::merge(&[letter_pdf(1), letter_pdf(3)]).unwrap();

    assert_eq!(page_labels(&merged), vec![1, 1, 2, 3]);
    assert_eq!(toolkit::info(&merged).unwrap().page_count, 4);
}

#[test]
fn test_metadata_reports_pages_and_size() {
    let input = letter_pdf(7);

    let metadata = toolkit::info(&input).unwrap();

    assert_eq!(metadata.page_count, 7);
    assert_eq!(metadata.byte_len, input.len());
    assert_eq!(metadata.title, None);
}

#[test]
fn test_extract_text_has_one_block_per_page() {
    let input = letter_pdf(3);

    let text = toolkit::text(&input).unwrap();

    assert!(text.matches("\n\n").count() >= 3);
}
