//! Paginated PDF rendering for mail messages
//!
//! This crate turns one parsed message into a paginated PDF:
//!
//! - [`PageGeometry`] computes the body column and the header/footer bands
//!   from paper size, margins and role fonts
//! - [`DocumentWriter`] drives the stage-ordered layout pass (mail headers,
//!   attachment listing, body) and the finalize pass that binds real page
//!   numbers into the band templates
//! - [`Canvas`] abstracts the drawing surface; [`PdfCanvas`] is the lopdf
//!   backend, tests substitute recording canvases
//!
//! Text never touches font files: widths come from built-in AFM advance
//! tables for the base-14 faces used.

pub mod canvas;
pub mod document;
pub mod error;
pub mod geometry;
pub mod metrics;
pub mod pdf;
pub mod wrap;

pub use canvas::{Canvas, FontFace, FontSpec, PageId};
pub use document::{BandTemplates, DocumentConfig, DocumentWriter};
pub use error::{LayoutError, Result};
pub use geometry::{Margins, PageGeometry, Paper, RoleFonts};
pub use pdf::PdfCanvas;
