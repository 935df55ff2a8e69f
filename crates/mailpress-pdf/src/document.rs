//! Pagination engine
//!
//! One [`DocumentWriter`] lays out exactly one message as one paginated
//! document. Content methods must be called in stage order (mail headers,
//! then optionally an attachment listing, then body text, then optionally
//! the post-body attachment slot); out-of-order calls are fatal. Header and
//! footer band text is deferred during the main pass — pages are only
//! recorded — and drawn by the finalize pass inside [`close`], where page
//! number and page count finally resolve. Saved documents therefore never
//! contain the sentinel page values.
//!
//! [`close`]: DocumentWriter::close

use crate::canvas::{Canvas, PageId};
use crate::error::{LayoutError, Result};
use crate::geometry::{PageGeometry, BOX_PADDING};
use crate::wrap::wrap_line;
use chrono::Locale;
use chrono_tz::Tz;
use mailpress_core::{FolderIndex, FormatProgram, Message, PageRefs, RenderContext};
use std::path::Path;
use tracing::warn;

/// Label/value gap in the mail-header block
const LABEL_GAP: f64 = 6.0;

/// Document stage, strictly forward-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Start,
    Headers,
    AttachmentsPre,
    Body,
    AttachmentsPost,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Headers => "headers",
            Self::AttachmentsPre => "attachments-pre",
            Self::Body => "body",
            Self::AttachmentsPost => "attachments-post",
        }
    }
}

/// The three header or footer box templates of a band
#[derive(Debug, Clone, Default)]
pub struct BandTemplates {
    pub left: Option<FormatProgram>,
    pub center: Option<FormatProgram>,
    pub right: Option<FormatProgram>,
}

impl BandTemplates {
    /// Whether any slot is populated
    #[must_use]
    pub fn any(&self) -> bool {
        self.left.is_some() || self.center.is_some() || self.right.is_some()
    }

    fn slots(&self) -> [Option<&FormatProgram>; 3] {
        [self.left.as_ref(), self.center.as_ref(), self.right.as_ref()]
    }
}

/// Per-document layout configuration
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    pub geometry: PageGeometry,
    pub header: BandTemplates,
    pub footer: BandTemplates,
    /// Repeat a recognized quote/indent prefix on wrapped continuation
    /// lines instead of a blank indent
    pub repeat_prefix: bool,
}

/// Lays out one message onto pages through a [`Canvas`]
pub struct DocumentWriter<'a, C: Canvas> {
    canvas: C,
    config: DocumentConfig,
    locale: Locale,
    tz: Tz,
    message: &'a Message,
    index: Option<&'a FolderIndex>,
    pages: Vec<PageId>,
    cursor: f64,
    stage: Stage,
    attachments_done: bool,
}

impl<'a, C: Canvas> DocumentWriter<'a, C> {
    /// Create a writer and validate the band layout.
    ///
    /// Box widths are estimated by rendering the band templates with
    /// sentinel page values; collisions are fatal here, before any content
    /// is placed.
    ///
    /// # Errors
    ///
    /// Fails on band box collisions or when a band template cannot render.
    pub fn new(
        mut canvas: C,
        config: DocumentConfig,
        locale: Locale,
        tz: Tz,
        message: &'a Message,
        index: Option<&'a FolderIndex>,
    ) -> Result<Self> {
        canvas.set_font(config.geometry.fonts.box_text);
        let ctx = base_context(locale, tz, message, index);
        for (band, templates) in [("header", &config.header), ("footer", &config.footer)] {
            let mut widths = [None; 3];
            for (slot, program) in templates.slots().iter().enumerate() {
                if let Some(program) = program {
                    let text = program.render(&ctx)?;
                    widths[slot] = Some(canvas.text_width(&text));
                }
            }
            config.geometry.check_band(band, widths)?;
        }

        Ok(Self {
            canvas,
            config,
            locale,
            tz,
            message,
            index,
            pages: Vec::new(),
            cursor: 0.0,
            stage: Stage::Start,
            attachments_done: false,
        })
    }

    /// Print one mail-header field. Valid in the start and headers stages;
    /// a call with no values is a no-op.
    ///
    /// # Errors
    ///
    /// Fatal when called after the headers stage.
    pub fn print_header(&mut self, name: &str, values: &[String]) -> Result<()> {
        if self.stage > Stage::Headers {
            return Err(self.out_of_order("print_header"));
        }
        if values.is_empty() {
            return Ok(());
        }
        self.stage = Stage::Headers;

        let fonts = self.config.geometry.fonts;
        let label = format!("{name}:");
        self.canvas.set_font(fonts.header_name);
        let label_w = self.canvas.text_width(&label);

        let value_x = self.config.geometry.margins.left + label_w + LABEL_GAP;
        let avail = self.config.geometry.column_width() - label_w - LABEL_GAP;

        self.canvas.set_font(fonts.header_value);
        let text = values.join(", ");
        let wrapped = {
            let canvas = &self.canvas;
            wrap_line(&text, avail, &|s| canvas.text_width(s), false)
        };

        for (i, line) in wrapped.iter().enumerate() {
            let (page, y) = self.line_advance(fonts.header_value.line_height());
            if i == 0 {
                self.canvas.set_font(fonts.header_name);
                self.canvas
                    .draw_text(page, self.config.geometry.margins.left, y, &label);
            }
            self.canvas.set_font(fonts.header_value);
            self.canvas.draw_text(page, value_x, y, line);
        }
        Ok(())
    }

    /// Print the attachment listing. Valid once, either between the headers
    /// and the body or directly after the body; a second call after one
    /// succeeded is a no-op with a warning. An empty listing is a no-op in
    /// any stage and consumes neither slot.
    ///
    /// # Errors
    ///
    /// Fatal when called with names before any header stage activity.
    pub fn print_attachments(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        if self.stage == Stage::Start {
            return Err(self.out_of_order("print_attachments"));
        }
        if self.attachments_done {
            warn!("attachment listing already printed; ignoring second call");
            return Ok(());
        }
        self.stage = match self.stage {
            Stage::Headers => Stage::AttachmentsPre,
            Stage::Body => Stage::AttachmentsPost,
            other => {
                // AttachmentsPre/AttachmentsPost imply attachments_done
                debug_assert!(false, "unreachable attachment stage {other:?}");
                return Err(self.out_of_order("print_attachments"));
            }
        };
        self.attachments_done = true;

        let fonts = self.config.geometry.fonts;
        self.line_advance(fonts.body.line_height());
        let (page, y) = self.line_advance(fonts.header_name.line_height());
        self.canvas.set_font(fonts.header_name);
        self.canvas
            .draw_text(page, self.config.geometry.margins.left, y, "Attachments:");

        self.canvas.set_font(fonts.body);
        for name in names {
            let (page, y) = self.line_advance(fonts.body.line_height());
            self.canvas.draw_text(
                page,
                self.config.geometry.margins.left,
                y,
                &format!("- {name}"),
            );
        }
        Ok(())
    }

    /// Print one body line, wrapping as needed. Advances into the body
    /// stage with one separating blank line when called earlier.
    ///
    /// # Errors
    ///
    /// Fatal after the post-body attachment listing.
    pub fn print_line(&mut self, line: &str) -> Result<()> {
        if self.stage > Stage::Body {
            return Err(self.out_of_order("print_line"));
        }
        if self.stage < Stage::Body {
            self.line_advance(self.config.geometry.fonts.body.line_height());
            self.stage = Stage::Body;
        }

        let fonts = self.config.geometry.fonts;
        self.canvas.set_font(fonts.body);
        let wrapped = {
            let canvas = &self.canvas;
            wrap_line(
                line,
                self.config.geometry.column_width(),
                &|s| canvas.text_width(s),
                self.config.repeat_prefix,
            )
        };
        for out in wrapped {
            let (page, y) = self.line_advance(fonts.body.line_height());
            self.canvas
                .draw_text(page, self.config.geometry.margins.left, y, &out);
        }
        Ok(())
    }

    /// Print several body lines.
    ///
    /// # Errors
    ///
    /// Same rules as [`print_line`](Self::print_line).
    pub fn print_lines<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.print_line(line.as_ref())?;
        }
        Ok(())
    }

    /// Close the document: run the finalize pass (real page numbers bound,
    /// band text rendered and drawn onto every page) and persist to `path`.
    /// Consuming the writer makes a second close or late content a compile
    /// error rather than a runtime one.
    ///
    /// Returns the number of pages written.
    ///
    /// # Errors
    ///
    /// Fails when band templates cannot render or the file cannot be
    /// written.
    pub fn close(mut self, path: &Path) -> Result<usize> {
        if self.stage < Stage::Body {
            warn!(stage = self.stage.name(), "document closed without body text");
        }
        if self.pages.is_empty() {
            let page = self.canvas.new_page();
            self.pages.push(page);
            self.cursor = self.config.geometry.body_top;
        }

        let total = u32::try_from(self.pages.len()).unwrap_or(u32::MAX);
        let header = self.config.header.clone();
        let footer = self.config.footer.clone();
        let header_y = self.config.geometry.header_box_y();
        let footer_y = self.config.geometry.footer_box_y();
        for (i, &page) in self.pages.iter().enumerate() {
            let refs = PageRefs {
                number: u32::try_from(i + 1).unwrap_or(u32::MAX),
                count: total,
            };
            let ctx = base_context(self.locale, self.tz, self.message, self.index).with_page(refs);
            draw_band(&mut self.canvas, &self.config.geometry, &header, page, header_y, &ctx)?;
            draw_band(&mut self.canvas, &self.config.geometry, &footer, page, footer_y, &ctx)?;
        }

        self.canvas.save(path)?;
        Ok(self.pages.len())
    }

    fn out_of_order(&self, call: &'static str) -> LayoutError {
        LayoutError::OutOfOrder {
            call,
            stage: self.stage.name(),
        }
    }

    /// Move the cursor down one line, opening a new page when the body
    /// band is exhausted; returns the page and baseline for drawing.
    fn line_advance(&mut self, height: f64) -> (PageId, f64) {
        if self.pages.is_empty() {
            let page = self.canvas.new_page();
            self.pages.push(page);
            self.cursor = self.config.geometry.body_top;
        }
        self.cursor -= height;
        if self.cursor < self.config.geometry.body_bottom {
            let page = self.canvas.new_page();
            self.pages.push(page);
            self.cursor = self.config.geometry.body_top - height;
        }
        (self.pages.last().copied().unwrap_or_default(), self.cursor)
    }
}

fn base_context<'a>(
    locale: Locale,
    tz: Tz,
    message: &'a Message,
    index: Option<&'a FolderIndex>,
) -> RenderContext<'a> {
    let ctx = RenderContext::new(locale, tz, message);
    match index {
        Some(index) => ctx.with_index(index),
        None => ctx,
    }
}

/// Render and draw one band (boxes and text) onto one page
fn draw_band<C: Canvas>(
    canvas: &mut C,
    geometry: &PageGeometry,
    templates: &BandTemplates,
    page: PageId,
    box_y: f64,
    ctx: &RenderContext<'_>,
) -> Result<()> {
    if !templates.any() {
        return Ok(());
    }
    canvas.set_font(geometry.fonts.box_text);
    let box_h = geometry.fonts.box_text.size + 2.0 * BOX_PADDING;

    let mut texts: [Option<String>; 3] = [None, None, None];
    let mut widths: [Option<f64>; 3] = [None; 3];
    for (slot, program) in templates.slots().iter().enumerate() {
        if let Some(program) = program {
            let text = program.render(ctx)?;
            widths[slot] = Some(canvas.text_width(&text));
            texts[slot] = Some(text);
        }
    }

    let boxes = geometry.band_boxes(widths);
    for (slot, placed) in boxes.iter().enumerate() {
        let (Some((x, w)), Some(text)) = (placed, &texts[slot]) else {
            continue;
        };
        canvas.stroke_rect(page, *x, box_y, *w, box_h);
        canvas.draw_text(page, x + BOX_PADDING, box_y + BOX_PADDING, text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::FontSpec;
    use crate::geometry::{Margins, Paper, RoleFonts};
    use mailpress_core::Mailbox;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Recording canvas; half-em-per-character measurement
    #[derive(Debug, Default)]
    struct Recorder {
        pages: usize,
        font: Option<FontSpec>,
        texts: Rc<RefCell<Vec<(PageId, String)>>>,
        rects: Rc<RefCell<Vec<PageId>>>,
        saved: Rc<RefCell<Vec<std::path::PathBuf>>>,
    }

    impl Canvas for Recorder {
        fn new_page(&mut self) -> PageId {
            self.pages += 1;
            self.pages - 1
        }
        fn set_font(&mut self, font: FontSpec) {
            self.font = Some(font);
        }
        fn text_width(&self, text: &str) -> f64 {
            let size = self.font.map_or(10.0, |f| f.size);
            text.chars().count() as f64 * size * 0.5
        }
        fn draw_text(&mut self, page: PageId, _x: f64, _y: f64, text: &str) {
            self.texts.borrow_mut().push((page, text.to_string()));
        }
        fn stroke_rect(&mut self, page: PageId, _x: f64, _y: f64, _w: f64, _h: f64) {
            self.rects.borrow_mut().push(page);
        }
        fn save(&mut self, path: &Path) -> Result<()> {
            self.saved.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    fn message() -> Message {
        Message {
            timestamp: 1_425_306_600,
            subject: Some("Hello".to_string()),
            from: vec![Mailbox {
                name: Some("Jane Doe".to_string()),
                address: "jane@example.com".to_string(),
            }],
            ..Message::default()
        }
    }

    /// Body band sized for exactly two lines per page
    fn tight_geometry() -> PageGeometry {
        let margins = Margins {
            top: 380.0,
            bottom: 380.0,
            ..Margins::default()
        };
        PageGeometry::new(Paper::A4, margins, RoleFonts::default(), true, true).unwrap()
    }

    fn writer(
        msg: &Message,
        geometry: PageGeometry,
        header: BandTemplates,
    ) -> (DocumentWriter<'_, Recorder>, Rc<RefCell<Vec<(PageId, String)>>>) {
        let canvas = Recorder::default();
        let texts = Rc::clone(&canvas.texts);
        let config = DocumentConfig {
            geometry,
            header,
            footer: BandTemplates::default(),
            repeat_prefix: true,
        };
        let w = DocumentWriter::new(canvas, config, Locale::POSIX, Tz::UTC, msg, None).unwrap();
        (w, texts)
    }

    fn page_header(header: &str) -> BandTemplates {
        BandTemplates {
            left: Some(FormatProgram::compile(header).unwrap()),
            ..BandTemplates::default()
        }
    }

    fn plain_geometry() -> PageGeometry {
        PageGeometry::new(Paper::A4, Margins::default(), RoleFonts::default(), false, false)
            .unwrap()
    }

    #[test]
    fn test_page_numbers_resolved_in_finalize() {
        let msg = message();
        let (mut doc, texts) = writer(&msg, tight_geometry(), page_header("(@p/@P)"));

        // blank separator + 5 lines = 6 advances, two per page
        for _ in 0..5 {
            doc.print_line("line").unwrap();
        }
        let pages = doc.close(Path::new("out.pdf")).unwrap();
        assert_eq!(pages, 3);

        let drawn: Vec<String> = texts.borrow().iter().map(|(_, t)| t.clone()).collect();
        assert!(drawn.contains(&"(1/3)".to_string()));
        assert!(drawn.contains(&"(2/3)".to_string()));
        assert!(drawn.contains(&"(3/3)".to_string()));
        assert!(!drawn.iter().any(|t| t.contains("998") || t.contains("999")));
    }

    #[test]
    fn test_attachments_once_only() {
        let msg = message();
        let (mut doc, texts) = writer(&msg, plain_geometry(), BandTemplates::default());

        doc.print_header("From", &["Jane Doe <jane@example.com>".to_string()])
            .unwrap();
        doc.print_attachments(&["a.pdf".to_string()]).unwrap();
        doc.print_line("body").unwrap();
        // second call after the first succeeded: warning, no-op
        doc.print_attachments(&["a.pdf".to_string()]).unwrap();
        doc.close(Path::new("out.pdf")).unwrap();

        let listings = texts
            .borrow()
            .iter()
            .filter(|(_, t)| t == "Attachments:")
            .count();
        assert_eq!(listings, 1);
    }

    #[test]
    fn test_empty_attachment_listing_is_inert() {
        let msg = message();
        let (mut doc, texts) = writer(&msg, plain_geometry(), BandTemplates::default());
        // nothing printed yet: an empty listing must not trip the stage check
        doc.print_attachments(&[]).unwrap();
        doc.print_line("body").unwrap();
        // nor consume the slot
        doc.print_attachments(&[]).unwrap();
        doc.print_attachments(&["real.pdf".to_string()]).unwrap();
        doc.close(Path::new("out.pdf")).unwrap();
        assert!(texts.borrow().iter().any(|(_, t)| t == "- real.pdf"));
    }

    #[test]
    fn test_attachments_before_headers_is_fatal() {
        let msg = message();
        let (mut doc, _) = writer(&msg, plain_geometry(), BandTemplates::default());
        let err = doc.print_attachments(&["a.pdf".to_string()]).unwrap_err();
        assert!(matches!(err, LayoutError::OutOfOrder { .. }));
    }

    #[test]
    fn test_post_body_attachment_slot() {
        let msg = message();
        let (mut doc, texts) = writer(&msg, plain_geometry(), BandTemplates::default());
        doc.print_header("Subject", &["Hello".to_string()]).unwrap();
        doc.print_line("body").unwrap();
        doc.print_attachments(&["late.pdf".to_string()]).unwrap();
        // body after the post slot is out of order
        let err = doc.print_line("more").unwrap_err();
        assert!(matches!(err, LayoutError::OutOfOrder { .. }));
        doc.close(Path::new("out.pdf")).unwrap();
        assert!(texts.borrow().iter().any(|(_, t)| t == "- late.pdf"));
    }

    #[test]
    fn test_header_with_no_values_is_noop() {
        let msg = message();
        let (mut doc, _) = writer(&msg, plain_geometry(), BandTemplates::default());
        doc.print_header("Cc", &[]).unwrap();
        // stage did not advance, so attachments are still out of order
        assert!(doc.print_attachments(&["x".to_string()]).is_err());
    }

    #[test]
    fn test_headers_after_body_is_fatal() {
        let msg = message();
        let (mut doc, _) = writer(&msg, plain_geometry(), BandTemplates::default());
        doc.print_line("body first").unwrap();
        let err = doc
            .print_header("Subject", &["late".to_string()])
            .unwrap_err();
        assert!(matches!(err, LayoutError::OutOfOrder { .. }));
    }

    #[test]
    fn test_close_without_body_still_saves() {
        let msg = message();
        let canvas = Recorder::default();
        let saved = Rc::clone(&canvas.saved);
        let config = DocumentConfig {
            geometry: plain_geometry(),
            header: BandTemplates::default(),
            footer: BandTemplates::default(),
            repeat_prefix: false,
        };
        let doc =
            DocumentWriter::new(canvas, config, Locale::POSIX, Tz::UTC, &msg, None).unwrap();
        let pages = doc.close(Path::new("empty.pdf")).unwrap();
        assert_eq!(pages, 1);
        assert_eq!(saved.borrow().len(), 1);
    }

    #[test]
    fn test_long_header_value_wraps_with_indent() {
        let msg = message();
        let (mut doc, texts) = writer(&msg, plain_geometry(), BandTemplates::default());
        let long = "a".repeat(60).to_string() + " " + &"b".repeat(60);
        doc.print_header("To", &[long]).unwrap();
        doc.print_line("body").unwrap();
        doc.close(Path::new("out.pdf")).unwrap();

        let values: Vec<String> = texts
            .borrow()
            .iter()
            .filter(|(_, t)| t.contains('a') || t.contains('b'))
            .map(|(_, t)| t.clone())
            .collect();
        assert!(values.len() >= 2, "value should have wrapped: {values:?}");
    }

    #[test]
    fn test_colliding_band_boxes_fatal_at_construction() {
        let msg = message();
        let canvas = Recorder::default();
        let config = DocumentConfig {
            geometry: tight_geometry(),
            header: BandTemplates {
                left: Some(FormatProgram::compile(&"x".repeat(120)).unwrap()),
                center: Some(FormatProgram::compile("mid").unwrap()),
                right: None,
            },
            footer: BandTemplates::default(),
            repeat_prefix: false,
        };
        let result = DocumentWriter::new(canvas, config, Locale::POSIX, Tz::UTC, &msg, None);
        assert!(matches!(result, Err(LayoutError::Geometry(_))));
    }
}
