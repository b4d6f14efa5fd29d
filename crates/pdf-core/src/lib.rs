//! PDF Core - Low-level PDF manipulation
//!
//! This crate provides functionality for:
//! - Opening and saving PDF documents
//! - Reading page geometry and rotation
//! - Embedding TrueType fonts (or falling back to a standard font)
//! - Drawing text at specific coordinates, optionally rotated
//! - Discovering interactive form fields and their widgets
//! - Flattening forms (removing widgets and the AcroForm dictionary)
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::{FontSource, PdfDocument, Rotation};
//!
//! let mut doc = PdfDocument::open("template.pdf")?;
//! doc.set_font(FontSource::helvetica());
//! doc.draw_text("Hello, World!", 0, 100.0, 700.0, 12.0, Rotation::Deg0)?;
//! doc.flatten_form()?;
//! doc.save("output.pdf")?;
//! ```

mod document;
mod font;
mod form;
mod page;
mod text;

pub use document::{Color, PdfDocument};
pub use font::{FontData, FontSource, StandardFont};
pub use form::{decode_text_string, FlattenReport, FormField, Widget};
pub use page::{PageInfo, Rect, Rotation};
pub use text::{format_number, generate_text_operators, TextRenderContext};

use thiserror::Error;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Font not found: {0}")]
    FontNotFound(String),

    #[error("Failed to parse font: {0}")]
    FontParseError(String),

    #[error("Invalid page index: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("Invalid text geometry: {0}")]
    InvalidGeometry(String),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;
