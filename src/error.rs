//! Error types for the PDF toolkit library

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PDF toolkit library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The page expression selected nothing inside the document
    #[error("No valid pages specified")]
    NoValidPages,

    /// The operation would produce a document without pages
    #[error("All pages are selected for deletion")]
    EmptyResult,

    /// The watermark overlay could not be decoded or rendered
    #[error("Failed to create watermark overlay from image: {source}")]
    OverlayConstruction {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Rotation is not a multiple of 90 degrees
    #[error("Rotation must be a multiple of 90 degrees, got {0}")]
    InvalidRotation(i64),

    /// Opacity outside of 0.0..=1.0
    #[error("Opacity must be between 0.0 and 1.0, got {0}")]
    InvalidOpacity(f64),

    /// Encrypted documents are not supported
    #[error("Encrypted PDF documents are not supported")]
    EncryptedDocument,

    /// Invalid PDF (no pages)
    #[error("PDF has no pages")]
    EmptyPdf,

    /// Watermark file type we cannot handle
    #[error("Unsupported watermark file type: {0} (expected pdf, png, jpg, jpeg, gif or bmp)")]
    UnsupportedOverlay(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Wrap an underlying decode or render failure
    pub fn overlay<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::OverlayConstruction { source: err.into() }
    }

    /// Stable machine-readable reason code for rejecting a request
    pub fn code(&self) -> &'static str {
        match self {
            Error::Pdf(_) => "invalid_pdf",
            Error::Io(_) => "io_error",
            Error::NoValidPages => "no_valid_pages",
            Error::EmptyResult => "empty_result",
            Error::OverlayConstruction { .. } => "overlay_construction",
            Error::InvalidRotation(_) => "invalid_rotation",
            Error::InvalidOpacity(_) => "invalid_opacity",
            Error::EncryptedDocument => "encrypted_document",
            Error::EmptyPdf => "empty_pdf",
            Error::UnsupportedOverlay(_) => "unsupported_overlay",
            Error::General(_) => "internal_error",
        }
    }
}
