//! PDF canvas backed by lopdf
//!
//! Pages are buffered as content-stream operations and the PDF object tree
//! is assembled once, at save time. Only the built-in base-14 faces are
//! referenced, by name, so no font embedding is involved; widths come from
//! the metrics tables.

use crate::canvas::{Canvas, FontFace, FontSpec, PageId};
use crate::error::Result;
use crate::metrics;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Canvas producing a PDF file
pub struct PdfCanvas {
    paper_w: f64,
    paper_h: f64,
    pages: Vec<Vec<Operation>>,
    fonts: BTreeMap<&'static str, String>,
    current: FontSpec,
}

impl PdfCanvas {
    /// Canvas for pages of the given size in points
    #[must_use]
    pub fn new(paper_w: f64, paper_h: f64) -> Self {
        Self {
            paper_w,
            paper_h,
            pages: Vec::new(),
            fonts: BTreeMap::new(),
            current: FontSpec::new(FontFace::Helvetica, 10.0),
        }
    }

    /// Number of pages created so far
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn font_name(&mut self, face: FontFace) -> String {
        let next = format!("F{}", self.fonts.len() + 1);
        self.fonts.entry(face.base_name()).or_insert(next).clone()
    }

    /// Latin-1 string bytes; anything unrepresentable becomes '?'
    fn encode_text(text: &str) -> Vec<u8> {
        text.chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
            .collect()
    }
}

impl Canvas for PdfCanvas {
    fn new_page(&mut self) -> PageId {
        self.pages.push(Vec::new());
        self.pages.len() - 1
    }

    fn set_font(&mut self, font: FontSpec) {
        self.current = font;
    }

    fn text_width(&self, text: &str) -> f64 {
        metrics::text_width(self.current.face, self.current.size, text)
    }

    fn draw_text(&mut self, page: PageId, x: f64, y: f64, text: &str) {
        let name = self.font_name(self.current.face);
        let size = self.current.size;
        let Some(ops) = self.pages.get_mut(page) else {
            return;
        };
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(name.into_bytes()), Object::Real(size as f32)],
        ));
        ops.push(Operation::new(
            "Td",
            vec![Object::Real(x as f32), Object::Real(y as f32)],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(
                Self::encode_text(text),
                StringFormat::Literal,
            )],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    fn stroke_rect(&mut self, page: PageId, x: f64, y: f64, w: f64, h: f64) {
        let Some(ops) = self.pages.get_mut(page) else {
            return;
        };
        ops.push(Operation::new(
            "re",
            vec![
                Object::Real(x as f32),
                Object::Real(y as f32),
                Object::Real(w as f32),
                Object::Real(h as f32),
            ],
        ));
        ops.push(Operation::new("S", vec![]));
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut font_dict = lopdf::Dictionary::new();
        for (base_name, resource_name) in &self.fonts {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => *base_name,
                "Encoding" => "WinAnsiEncoding",
            });
            font_dict.set(resource_name.as_bytes(), font_id);
        }
        let resources_id = doc.add_object(dictionary! { "Font" => font_dict });

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
        for ops in &self.pages {
            let content = Content {
                operations: ops.clone(),
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    Object::Real(self.paper_w as f32),
                    Object::Real(self.paper_h as f32),
                ],
            });
            kids.push(page_id.into());
        }

        let page_count = i64::try_from(self.pages.len()).unwrap_or(i64::MAX);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut file = File::create(path)?;
        doc.save_to(&mut file)?;
        debug!(path = %path.display(), pages = self.pages.len(), "document saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_are_sequential() {
        let mut canvas = PdfCanvas::new(595.0, 842.0);
        assert_eq!(canvas.new_page(), 0);
        assert_eq!(canvas.new_page(), 1);
        assert_eq!(canvas.page_count(), 2);
    }

    #[test]
    fn test_text_width_follows_current_font() {
        let mut canvas = PdfCanvas::new(595.0, 842.0);
        canvas.set_font(FontSpec::new(FontFace::Courier, 10.0));
        assert!((canvas.text_width("ab") - 12.0).abs() < 1e-9);
        canvas.set_font(FontSpec::new(FontFace::Courier, 20.0));
        assert!((canvas.text_width("ab") - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_encode_text_is_latin1_lossy() {
        assert_eq!(PdfCanvas::encode_text("ab"), b"ab");
        assert_eq!(PdfCanvas::encode_text("\u{e9}"), vec![0xe9]);
        assert_eq!(PdfCanvas::encode_text("\u{2014}"), b"?");
    }

    #[test]
    fn test_save_produces_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");

        let mut canvas = PdfCanvas::new(595.0, 842.0);
        let page = canvas.new_page();
        canvas.set_font(FontSpec::new(FontFace::Helvetica, 12.0));
        canvas.draw_text(page, 72.0, 700.0, "hello");
        canvas.stroke_rect(page, 72.0, 680.0, 100.0, 30.0);
        canvas.save(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        let loaded = Document::load(&path).unwrap();
        assert_eq!(loaded.get_pages().len(), 1);
    }
}
