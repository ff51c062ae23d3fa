//! HTML to DOCX conversion.
//!
//! The pipeline is: decode and parse the HTML ([`dom`]), translate the body
//! into a [`model::DocumentModel`] ([`translate`]), then serialize it as an
//! OOXML word-processing package ([`docx::DocumentBuilder::finalize`]).
//! Each conversion owns its parse tree and document, so conversions can run
//! in parallel without coordination.
//!
//! ```no_run
//! let bytes = html_docx::convert_html("<h1>Title</h1><p>Hello</p>")?;
//! std::fs::write("out.docx", bytes)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod docx;
pub mod dom;
pub mod error;
pub mod format;
pub mod hyperlink;
pub mod model;
pub mod package;
pub mod service;
pub mod style;
pub mod translate;

pub use error::{ConvertError, Result};
pub use model::DocumentModel;

use dom::ParsedDocument;

/// MIME type of the produced packages.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Parses `html`, rejecting input that carries no markup at all.
pub fn parse_html(html: &str) -> Result<ParsedDocument> {
    let doc = ParsedDocument::parse(html);
    if !doc.has_markup() {
        return Err(ConvertError::InvalidHtml);
    }
    Ok(doc)
}

/// Translates `html` without serializing it.
pub fn html_to_model(html: &str) -> Result<DocumentModel> {
    let doc = parse_html(html)?;
    Ok(translate::translate(&doc)?.into_model())
}

/// Converts an HTML document into DOCX bytes.
pub fn convert_html(html: &str) -> Result<Vec<u8>> {
    let doc = parse_html(html)?;
    translate::translate(&doc)?.finalize()
}

/// Like [`convert_html`], for raw uploaded bytes that must be UTF-8.
pub fn convert_bytes(bytes: &[u8]) -> Result<Vec<u8>> {
    convert_html(dom::decode_html(bytes)?)
}
