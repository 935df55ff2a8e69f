//! Drawing collaborator seam
//!
//! The pagination engine draws through this trait and nothing else: page
//! creation, font selection, string-width measurement, text placement,
//! rectangle stroking and file persistence. The production implementation
//! is [`PdfCanvas`](crate::pdf::PdfCanvas); tests use a recording mock.

use crate::error::Result;
use std::path::Path;

/// Identifier of a created page, stable for the life of the canvas
pub type PageId = usize;

/// One of the built-in faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFace {
    Helvetica,
    HelveticaBold,
    Courier,
    CourierBold,
}

impl FontFace {
    /// PostScript base font name
    #[must_use]
    pub fn base_name(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
        }
    }
}

/// A face at a size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub face: FontFace,
    /// Size in points
    pub size: f64,
}

impl FontSpec {
    #[must_use]
    pub fn new(face: FontFace, size: f64) -> Self {
        Self { face, size }
    }

    /// Baseline-to-baseline distance used for layout
    #[must_use]
    pub fn line_height(&self) -> f64 {
        self.size * 1.2
    }
}

/// Drawing primitives the pagination engine is allowed to use
pub trait Canvas {
    /// Create a page; coordinates are PDF-style, origin bottom-left
    fn new_page(&mut self) -> PageId;

    /// Select the font used by subsequent measurement and text placement
    fn set_font(&mut self, font: FontSpec);

    /// Width of `text` in the current font, in points
    fn text_width(&self, text: &str) -> f64;

    /// Place `text` with its baseline at (x, y) on `page`
    fn draw_text(&mut self, page: PageId, x: f64, y: f64, text: &str);

    /// Stroke the outline of a rectangle on `page`
    fn stroke_rect(&mut self, page: PageId, x: f64, y: f64, w: f64, h: f64);

    /// Persist the document.
    ///
    /// # Errors
    ///
    /// Fails when the output file cannot be created or written.
    fn save(&mut self, path: &Path) -> Result<()>;
}
