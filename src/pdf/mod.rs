//! PDF manipulation module

pub mod document;
pub mod merge;
pub mod metadata;
pub mod overlay;
pub mod recompose;
pub mod watermark;

// Re-export commonly used items
pub use document::{load_document, page_geometry, PageGeometry};
pub use merge::merge_documents;
pub use metadata::{extract_metadata, extract_text, PdfMetadata};
pub use overlay::{build_overlay, fit_centered, Opacity, Overlay, OverlayBuilder, Placement};
pub use recompose::{recompose, rotate_all, RecomposeMode, Rotation};
pub use watermark::{
    composite_watermark, GeometryCache, OverlaySource, WatermarkCompositor, WatermarkOptions,
};
