//! PDF Toolkit Library
//!
//! In-memory PDF page operations:
//! - Split a document by page range expression (`"1-3,5,7-9"`)
//! - Rotate all pages or a selection of pages
//! - Delete pages
//! - Merge several documents
//! - Stamp a translucent image (or a ready-made PDF page) as a watermark
//! - Report page count and metadata, extract text
//!
//! Every operation takes the document as bytes and returns the finished
//! document as bytes.
//!
//! # Example
//!
//! ```no_run
//! use pdf_toolkit::toolkit;
//!
//! let input = std::fs::read("report.pdf").unwrap();
//! let first_pages = toolkit::split(&input, "1-3, 5").expect("Failed to split");
//! std::fs::write("report_split.pdf", first_pages).unwrap();
//! ```

pub mod error;
pub mod pdf;
pub mod range;
pub mod toolkit;

// Re-export commonly used items
pub use error::{Error, Result};
pub use range::{resolve_pages, PageIndexSet, RangeToken};
