//! Error types for HTML to DOCX conversion.

use std::io;
use thiserror::Error;

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Errors that can occur while converting an HTML document.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The uploaded bytes are not valid UTF-8.
    #[error("Input is not valid UTF-8")]
    InvalidEncoding,

    /// The input does not contain any HTML markup.
    #[error("Invalid HTML file")]
    InvalidHtml,

    /// A `font-size` value could not be read as a point size.
    #[error("Invalid font-size value: {0}")]
    InvalidFontSize(String),

    /// A `color` value is not a `#RRGGBB` hex triple.
    #[error("Invalid color format: {0}")]
    InvalidColorFormat(String),

    /// Writing the OOXML package failed.
    #[error("Package error: {0}")]
    Package(#[from] zip::result::ZipError),

    /// I/O error when writing the package.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ConvertError {
    /// True for errors caused by the submitted content itself rather than by
    /// the translation of otherwise valid markup.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidEncoding | Self::InvalidHtml)
    }
}
