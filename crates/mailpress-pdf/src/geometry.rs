//! Page layout geometry
//!
//! Computed once per document from paper size, margins and the four font
//! roles. Construction validates that the header box, footer box and at
//! least one body line fit between the margins; box collision checks run
//! later, per document, once box text widths are measurable.

use crate::canvas::{FontFace, FontSpec};
use crate::error::{LayoutError, Result};

/// Minimum horizontal separation between adjacent header/footer boxes
pub const BOX_SEPARATION: f64 = 10.0;
/// Inner padding between a box outline and its text
pub const BOX_PADDING: f64 = 4.0;
/// Vertical gap between a band box and the body area
const BAND_GAP: f64 = 8.0;

/// Paper size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Paper {
    /// 595 x 842 pt
    #[default]
    A4,
    /// 612 x 792 pt
    Letter,
}

impl Paper {
    /// (width, height) in points
    #[must_use]
    pub fn size(self) -> (f64, f64) {
        match self {
            Self::A4 => (595.0, 842.0),
            Self::Letter => (612.0, 792.0),
        }
    }
}

/// Page margins in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 54.0,
            bottom: 54.0,
            left: 54.0,
            right: 54.0,
        }
    }
}

/// The four font roles of a document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleFonts {
    /// Header/footer box text
    pub box_text: FontSpec,
    /// Mail-header field name
    pub header_name: FontSpec,
    /// Mail-header field value
    pub header_value: FontSpec,
    /// Body text
    pub body: FontSpec,
}

impl Default for RoleFonts {
    fn default() -> Self {
        Self {
            box_text: FontSpec::new(FontFace::Helvetica, 8.0),
            header_name: FontSpec::new(FontFace::HelveticaBold, 10.0),
            header_value: FontSpec::new(FontFace::Helvetica, 10.0),
            body: FontSpec::new(FontFace::Courier, 10.0),
        }
    }
}

/// Resolved page geometry
#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub paper_w: f64,
    pub paper_h: f64,
    pub margins: Margins,
    pub fonts: RoleFonts,
    /// Height of the header band box; zero when no header templates exist
    pub header_box_h: f64,
    /// Height of the footer band box; zero when no footer templates exist
    pub footer_box_h: f64,
    /// Top of the body band (first baseline goes one line below)
    pub body_top: f64,
    /// Bottom boundary of the body band
    pub body_bottom: f64,
}

impl PageGeometry {
    /// Compute and validate the geometry.
    ///
    /// # Errors
    ///
    /// Fails when the header box, footer box and one body line cannot fit
    /// between the top and bottom margins.
    pub fn new(
        paper: Paper,
        margins: Margins,
        fonts: RoleFonts,
        has_header: bool,
        has_footer: bool,
    ) -> Result<Self> {
        let (paper_w, paper_h) = paper.size();
        let box_h = fonts.box_text.size + 2.0 * BOX_PADDING;
        let header_box_h = if has_header { box_h } else { 0.0 };
        let footer_box_h = if has_footer { box_h } else { 0.0 };

        let body_top = paper_h
            - margins.top
            - if has_header {
                header_box_h + BAND_GAP
            } else {
                0.0
            };
        let body_bottom = margins.bottom
            + if has_footer {
                footer_box_h + BAND_GAP
            } else {
                0.0
            };

        if body_top - body_bottom < fonts.body.line_height() {
            return Err(LayoutError::Geometry(format!(
                "margins leave {:.1}pt for body text, need at least {:.1}pt",
                body_top - body_bottom,
                fonts.body.line_height()
            )));
        }

        Ok(Self {
            paper_w,
            paper_h,
            margins,
            fonts,
            header_box_h,
            footer_box_h,
            body_top,
            body_bottom,
        })
    }

    /// Usable column width for header values and body text
    #[must_use]
    pub fn column_width(&self) -> f64 {
        self.paper_w - self.margins.left - self.margins.right
    }

    /// Horizontal placement of the three band boxes given their text
    /// widths; absent slots yield `None`. Box widths include padding.
    #[must_use]
    pub fn band_boxes(&self, text_widths: [Option<f64>; 3]) -> [Option<(f64, f64)>; 3] {
        let widths = text_widths.map(|w| w.map(|w| w + 2.0 * BOX_PADDING));
        let left = widths[0].map(|w| (self.margins.left, w));
        let center = widths[1].map(|w| ((self.paper_w - w) / 2.0, w));
        let right = widths[2].map(|w| (self.paper_w - self.margins.right - w, w));
        [left, center, right]
    }

    /// Validate that the band boxes do not collide: adjacent pairs must be
    /// separated by at least [`BOX_SEPARATION`], and the left/right boxes
    /// may not cross the horizontal midpoint offset by half the center box
    /// width.
    ///
    /// # Errors
    ///
    /// Returns a geometry error naming the colliding pair.
    pub fn check_band(&self, band: &'static str, text_widths: [Option<f64>; 3]) -> Result<()> {
        let [left, center, right] = self.band_boxes(text_widths);
        let mid = self.paper_w / 2.0;
        let half_center = center.map_or(0.0, |(_, w)| w / 2.0);

        if let Some((x, w)) = left {
            if x + w > mid - half_center {
                return Err(LayoutError::Geometry(format!(
                    "{band} left box crosses the center line"
                )));
            }
        }
        if let Some((x, _)) = right {
            if x < mid + half_center {
                return Err(LayoutError::Geometry(format!(
                    "{band} right box crosses the center line"
                )));
            }
        }
        let pairs = [(left, center, "left/center"), (center, right, "center/right")];
        for (a, b, what) in pairs {
            if let (Some((ax, aw)), Some((bx, _))) = (a, b) {
                if bx - (ax + aw) < BOX_SEPARATION {
                    return Err(LayoutError::Geometry(format!(
                        "{band} {what} boxes closer than {BOX_SEPARATION}pt"
                    )));
                }
            }
        }
        if let (Some((ax, aw)), Some((bx, _)), None) = (left, right, center) {
            if bx - (ax + aw) < BOX_SEPARATION {
                return Err(LayoutError::Geometry(format!(
                    "{band} left/right boxes closer than {BOX_SEPARATION}pt"
                )));
            }
        }
        Ok(())
    }

    /// Bottom edge of the header band box
    #[must_use]
    pub fn header_box_y(&self) -> f64 {
        self.paper_h - self.margins.top - self.header_box_h
    }

    /// Bottom edge of the footer band box
    #[must_use]
    pub fn footer_box_y(&self) -> f64 {
        self.margins.bottom
    }
}
