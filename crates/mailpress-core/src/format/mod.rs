//! Format template compiler
//!
//! Compiles the single-line templating mini-language used for output
//! filenames and for in-document header/footer text. A compiled
//! [`FormatProgram`] is an immutable sequence of literal and code segments;
//! rendering concatenates them in order against a [`RenderContext`].
//!
//! Two escape families exist: `%`-escapes are date/time codes bound to the
//! message timestamp, `@`-escapes select message data (addresses, display
//! names, serials, page numbers, subject, message-id, arbitrary headers).
//! Any malformed escape aborts compilation; no partial program is ever
//! produced.
//!
//! Page-number codes render as the sentinel values 998/999 when the context
//! has no page references bound, which lets callers run size-estimation
//! passes before pagination exists. Programs carrying page codes are
//! flagged so filename callers can reject them and the folder index can
//! mark its evaluation cache inexact.

mod codes;
mod datetime;

use crate::context::RenderContext;
use crate::error::{CompileResult, RenderError, TemplateError};
use crate::message::AddrField;
use codes::{AddrPart, AddressCode, Code, NumericCode, NumericKind, PhraseCode, Range, Width};
use datetime::Percent;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Compile-time classification of a program's data dependencies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatFlags {
    /// Any `@`-code other than `@@`
    pub message: bool,
    /// Any `%`-escape other than `%%`
    pub datetime: bool,
    /// Number of page-number/page-count codes
    pub page_refs: usize,
    /// Number of folder-serial codes (day/box serials and counts)
    pub serial_refs: usize,
}

/// One segment of a compiled program
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Code(Code),
}

/// A compiled format template
#[derive(Debug, Clone)]
pub struct FormatProgram {
    id: u64,
    template: String,
    segments: Vec<Segment>,
    flags: FormatFlags,
}

impl FormatProgram {
    /// Compile a template.
    ///
    /// # Errors
    ///
    /// Any malformed escape fails the whole compile with a descriptive
    /// [`TemplateError`].
    pub fn compile(template: &str) -> CompileResult<Self> {
        let mut compiler = Compiler::new(template)?;
        compiler.run()?;
        Ok(Self {
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            template: template.to_string(),
            segments: compiler.segments,
            flags: compiler.flags,
        })
    }

    /// Identity of this compilation, used as the folder-index cache key
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The source template text
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Data-dependency flags accumulated during compilation
    #[must_use]
    pub fn flags(&self) -> FormatFlags {
        self.flags
    }

    /// Render the program against a context.
    ///
    /// # Errors
    ///
    /// Fails when a serial code is rendered without a folder index attached
    /// to the context, or with an index that does not contain the message.
    pub fn render(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Code(code) => out.push_str(&code.eval(ctx)?),
            }
        }
        Ok(out)
    }
}

/// Template-level defaults for phrase codes, reset once by `@!`
struct PhraseDefaults {
    quote_strip: bool,
    space_replace: Option<char>,
}

impl Default for PhraseDefaults {
    fn default() -> Self {
        Self {
            quote_strip: true,
            space_replace: Some('_'),
        }
    }
}

/// Modifiers scanned before a selector letter, uninterpreted
#[derive(Default)]
struct Mods {
    num: Option<Range>,
    left: bool,
    auto: bool,
    fold: bool,
    keep_quotes: bool,
    part: Option<AddrPart>,
    dot: Option<char>,
    join: Option<char>,
}

impl Mods {
    /// One representative character for error reporting
    fn representative(&self) -> Option<char> {
        if self.num.is_some() {
            Some('0')
        } else if self.left {
            Some('-')
        } else if self.auto {
            Some('*')
        } else if self.fold {
            Some('^')
        } else if self.keep_quotes {
            Some('"')
        } else if self.part.is_some() {
            Some('<')
        } else if self.dot.is_some() {
            Some('.')
        } else if self.join.is_some() {
            Some(',')
        } else {
            None
        }
    }
}

struct Compiler {
    chars: Vec<char>,
    pos: usize,
    literal: String,
    segments: Vec<Segment>,
    flags: FormatFlags,
    phrase_defaults: PhraseDefaults,
}

impl Compiler {
    fn new(template: &str) -> CompileResult<Self> {
        if template.contains(['\n', '\r']) {
            return Err(TemplateError::EmbeddedNewline);
        }
        Ok(Self {
            chars: template.chars().collect(),
            pos: 0,
            literal: String::new(),
            segments: Vec::new(),
            flags: FormatFlags::default(),
            phrase_defaults: PhraseDefaults::default(),
        })
    }

    fn run(&mut self) -> CompileResult<()> {
        while let Some(&c) = self.chars.get(self.pos) {
            match c {
                '%' => {
                    self.pos += 1;
                    match datetime::parse_percent(&self.chars, &mut self.pos)? {
                        Percent::Literal(lit) => self.literal.push(lit),
                        Percent::Fragment(fragment) => {
                            self.flags.datetime = true;
                            self.push_code(Code::DateTime(fragment));
                        }
                    }
                }
                '@' => {
                    self.pos += 1;
                    self.parse_at()?;
                }
                other => {
                    self.literal.push(other);
                    self.pos += 1;
                }
            }
        }
        self.flush_literal();
        Ok(())
    }

    fn flush_literal(&mut self) {
        if !self.literal.is_empty() {
            let text = std::mem::take(&mut self.literal);
            self.segments.push(Segment::Literal(text));
        }
    }

    fn push_code(&mut self, code: Code) {
        self.flush_literal();
        self.segments.push(Segment::Code(code));
    }

    fn parse_at(&mut self) -> CompileResult<()> {
        let mods = self.scan_modifiers()?;
        let Some(&selector) = self.chars.get(self.pos) else {
            return Err(TemplateError::TrailingEscape);
        };
        self.pos += 1;

        match selector {
            '@' => {
                if let Some(modifier) = mods.representative() {
                    return Err(TemplateError::BadModifier {
                        modifier,
                        selector: '@',
                    });
                }
                self.literal.push('@');
                Ok(())
            }
            '!' => {
                if let Some(modifier) = mods.representative() {
                    return Err(TemplateError::BadModifier {
                        modifier,
                        selector: '!',
                    });
                }
                // Irreversible within this template.
                self.phrase_defaults = PhraseDefaults {
                    quote_strip: false,
                    space_replace: None,
                };
                Ok(())
            }
            '{' => {
                if let Some(modifier) = mods.representative() {
                    return Err(TemplateError::BadModifier {
                        modifier,
                        selector: '{',
                    });
                }
                let name = self.read_header_name()?;
                self.flags.message = true;
                self.push_code(Code::Header(name));
                Ok(())
            }
            'f' | 't' | 'c' | 'b' | 's' => self.finish_address(selector, mods),
            'F' | 'T' | 'C' | 'B' | 'S' => self.finish_phrase(selector, mods),
            'n' | 'N' | 'i' | 'I' | 'p' | 'P' => self.finish_numeric(selector, mods),
            'u' | 'm' => {
                if let Some(modifier) = mods.representative() {
                    return Err(TemplateError::BadModifier { modifier, selector });
                }
                self.flags.message = true;
                self.push_code(if selector == 'u' {
                    Code::Subject
                } else {
                    Code::MessageId
                });
                Ok(())
            }
            other => Err(TemplateError::UnknownSelector(other)),
        }
    }

    fn scan_modifiers(&mut self) -> CompileResult<Mods> {
        let mut mods = Mods::default();
        loop {
            let Some(&c) = self.chars.get(self.pos) else {
                return Ok(mods);
            };
            match c {
                '0'..='9' => {
                    let start = self.read_number();
                    // digits '-' digits is a range; a '-' followed by
                    // anything else is the left-adjust flag and stays
                    let end = if self.chars.get(self.pos) == Some(&'-')
                        && self
                            .chars
                            .get(self.pos + 1)
                            .is_some_and(char::is_ascii_digit)
                    {
                        self.pos += 1;
                        Some(self.read_number())
                    } else {
                        None
                    };
                    mods.num = Some(Range { start, end });
                }
                '-' => {
                    mods.left = true;
                    self.pos += 1;
                }
                '*' => {
                    mods.auto = true;
                    self.pos += 1;
                }
                '^' => {
                    mods.fold = true;
                    self.pos += 1;
                }
                '"' => {
                    mods.keep_quotes = true;
                    self.pos += 1;
                }
                '<' => {
                    mods.part = Some(AddrPart::User);
                    self.pos += 1;
                }
                '>' => {
                    mods.part = Some(AddrPart::Host);
                    self.pos += 1;
                }
                '.' => {
                    self.pos += 1;
                    let Some(&fill) = self.chars.get(self.pos) else {
                        return Err(TemplateError::TrailingEscape);
                    };
                    mods.dot = Some(fill);
                    self.pos += 1;
                }
                ',' => {
                    self.pos += 1;
                    let Some(&sep) = self.chars.get(self.pos) else {
                        return Err(TemplateError::TrailingEscape);
                    };
                    mods.join = Some(sep);
                    self.pos += 1;
                }
                _ => return Ok(mods),
            }
        }
    }

    fn read_number(&mut self) -> u32 {
        let mut value: u32 = 0;
        while let Some(digit) = self.chars.get(self.pos).and_then(|c| c.to_digit(10)) {
            value = value.saturating_mul(10).saturating_add(digit);
            self.pos += 1;
        }
        value
    }

    fn read_header_name(&mut self) -> CompileResult<String> {
        let mut name = String::new();
        loop {
            match self.chars.get(self.pos) {
                Some('}') => {
                    self.pos += 1;
                    return Ok(name);
                }
                Some(&c) => {
                    name.push(c);
                    self.pos += 1;
                }
                None => return Err(TemplateError::UnterminatedBrace),
            }
        }
    }

    fn finish_address(&mut self, selector: char, mods: Mods) -> CompileResult<()> {
        reject(mods.left, '-', selector)?;
        reject(mods.auto, '*', selector)?;
        reject(mods.fold, '^', selector)?;
        reject(mods.keep_quotes, '"', selector)?;
        reject(mods.dot.is_some(), '.', selector)?;

        let field = addr_field(selector);
        let range = drop_range_on_single(field, mods.num, selector);

        self.flags.message = true;
        self.push_code(Code::Address(AddressCode {
            field,
            part: mods.part,
            range,
            join: mods.join,
        }));
        Ok(())
    }

    fn finish_phrase(&mut self, selector: char, mods: Mods) -> CompileResult<()> {
        reject(mods.left, '-', selector)?;
        reject(mods.auto, '*', selector)?;
        reject(mods.part.is_some(), '<', selector)?;

        let field = addr_field(selector.to_ascii_lowercase());
        let range = drop_range_on_single(field, mods.num, selector);

        self.flags.message = true;
        self.push_code(Code::Phrase(PhraseCode {
            field,
            range,
            fold: mods.fold,
            quote_strip: self.phrase_defaults.quote_strip && !mods.keep_quotes,
            space_replace: mods.dot.or(self.phrase_defaults.space_replace),
            join: mods.join,
        }));
        Ok(())
    }

    fn finish_numeric(&mut self, selector: char, mods: Mods) -> CompileResult<()> {
        reject(mods.fold, '^', selector)?;
        reject(mods.keep_quotes, '"', selector)?;
        reject(mods.part.is_some(), '<', selector)?;
        reject(mods.join.is_some(), ',', selector)?;

        let width = match mods.num {
            Some(Range { end: Some(_), .. }) => {
                return Err(TemplateError::BadModifier {
                    modifier: '-',
                    selector,
                });
            }
            Some(Range { start, .. }) => Width::Fixed(start),
            None if mods.auto => Width::Auto,
            None => Width::None,
        };

        let kind = match selector {
            'n' => NumericKind::DaySerial,
            'N' => NumericKind::DayCount,
            'i' => NumericKind::BoxSerial,
            'I' => NumericKind::BoxCount,
            'p' => NumericKind::PageNumber,
            _ => NumericKind::PageCount,
        };
        if kind.is_page() {
            self.flags.page_refs += 1;
        }
        if kind.is_serial() {
            self.flags.serial_refs += 1;
        }

        self.flags.message = true;
        self.push_code(Code::Numeric(NumericCode {
            kind,
            left_adjust: mods.left,
            width,
            fill: mods.dot,
        }));
        Ok(())
    }
}

fn reject(present: bool, modifier: char, selector: char) -> CompileResult<()> {
    if present {
        Err(TemplateError::BadModifier { modifier, selector })
    } else {
        Ok(())
    }
}

fn addr_field(selector: char) -> AddrField {
    match selector {
        'f' => AddrField::From,
        't' => AddrField::To,
        'c' => AddrField::Cc,
        'b' => AddrField::Bcc,
        _ => AddrField::Sender,
    }
}

/// The sender field is single-valued; a range modifier on it is dropped
/// with a warning rather than rejected
fn drop_range_on_single(field: AddrField, range: Option<Range>, selector: char) -> Option<Range> {
    if field.single_valued() && range.is_some() {
        warn!(selector = %selector, "ignoring index range on single-valued sender code");
        return None;
    }
    range
}
