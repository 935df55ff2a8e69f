//! Error types for layout and PDF output

use mailpress_core::RenderError;
use std::io;
use thiserror::Error;

/// Result type for layout operations
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Errors raised while laying out or persisting a document
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Geometry cannot fit the required content
    #[error("page geometry: {0}")]
    Geometry(String),

    /// Pagination method invoked outside its allowed stage
    #[error("document call out of sequence: {call} is not valid in stage {stage}")]
    OutOfOrder {
        /// The offending call
        call: &'static str,
        /// The stage the document was in
        stage: &'static str,
    },

    /// Header/footer template failed to render
    #[error("header/footer render: {0}")]
    Render(#[from] RenderError),

    /// I/O error while persisting
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// PDF assembly error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
}
