//! `@`-code evaluation
//!
//! Each compiled `@`-escape becomes one of these code values. Modifiers are
//! stored as plain data and applied as an explicit ordered pipeline during
//! evaluation (range-select, then case-fold, quote-strip, space-replace,
//! join), regardless of the order they were written in the template.

use crate::context::{RenderContext, SENTINEL_PAGE_COUNT, SENTINEL_PAGE_NUMBER};
use crate::error::RenderError;
use crate::message::{AddrField, Mailbox};

/// Default list join separator
pub(super) const DEFAULT_JOIN: &str = ", ";

/// 1-based inclusive selection of a list slice; `None` end means "to the end"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Range {
    pub start: u32,
    pub end: Option<u32>,
}

impl Range {
    fn apply<T>(self, items: Vec<T>) -> Vec<T> {
        let start = (self.start.max(1) - 1) as usize;
        let end = self
            .end
            .map_or(self.start as usize, |e| e as usize)
            .min(items.len());
        if start >= items.len() || start >= end {
            return Vec::new();
        }
        items
            .into_iter()
            .skip(start)
            .take(end - start)
            .collect()
    }
}

/// Which part of an address an address-value code yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AddrPart {
    User,
    Host,
}

/// Address-value code (lower-case selector letters)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct AddressCode {
    pub field: AddrField,
    pub part: Option<AddrPart>,
    pub range: Option<Range>,
    pub join: Option<char>,
}

/// Phrase code (upper-case selector letters); modifier values already merged
/// with the template-level phrase defaults at compile time
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct PhraseCode {
    pub field: AddrField,
    pub range: Option<Range>,
    pub fold: bool,
    pub quote_strip: bool,
    pub space_replace: Option<char>,
    pub join: Option<char>,
}

/// The six numeric categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum NumericKind {
    DaySerial,
    DayCount,
    BoxSerial,
    BoxCount,
    PageNumber,
    PageCount,
}

impl NumericKind {
    /// Whether the value only resolves during the pagination finalize pass
    pub fn is_page(self) -> bool {
        matches!(self, Self::PageNumber | Self::PageCount)
    }

    /// Whether the value comes from the folder index
    pub fn is_serial(self) -> bool {
        !self.is_page()
    }
}

/// Field width of a numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum Width {
    /// No width given
    #[default]
    None,
    /// Fixed field width
    Fixed(u32),
    /// Width of the category maximum (`*`)
    Auto,
}

/// Numeric code
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct NumericCode {
    pub kind: NumericKind,
    pub left_adjust: bool,
    pub width: Width,
    pub fill: Option<char>,
}

/// One compiled `@`-code
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Code {
    DateTime(String),
    Address(AddressCode),
    Phrase(PhraseCode),
    Numeric(NumericCode),
    Subject,
    MessageId,
    Header(String),
}

impl Code {
    pub fn eval(&self, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        match self {
            Self::DateTime(fragment) => Ok(ctx
                .timestamp()
                .format_localized(fragment, ctx.locale)
                .to_string()),
            Self::Address(code) => Ok(eval_address(code, ctx)),
            Self::Phrase(code) => Ok(eval_phrase(code, ctx)),
            Self::Numeric(code) => eval_numeric(code, ctx),
            Self::Subject => Ok(ctx.message.subject.clone().unwrap_or_default()),
            Self::MessageId => Ok(ctx.message.message_id.clone().unwrap_or_default()),
            Self::Header(name) => Ok(ctx
                .message
                .header_values(name)
                .collect::<Vec<_>>()
                .join(DEFAULT_JOIN)),
        }
    }
}

fn join(items: Vec<String>, sep: Option<char>) -> String {
    match sep {
        Some(c) => items.join(&c.to_string()),
        None => items.join(DEFAULT_JOIN),
    }
}

fn eval_address(code: &AddressCode, ctx: &RenderContext<'_>) -> String {
    let mut items: Vec<String> = ctx
        .message
        .addresses(code.field)
        .iter()
        .map(|mb| match code.part {
            Some(AddrPart::User) => mb.user().to_string(),
            Some(AddrPart::Host) => mb.host().to_string(),
            None => mb.address.clone(),
        })
        .collect();
    if let Some(range) = code.range {
        items = range.apply(items);
    }
    join(items, code.join)
}

fn eval_phrase(code: &PhraseCode, ctx: &RenderContext<'_>) -> String {
    let mut items: Vec<String> = ctx
        .message
        .addresses(code.field)
        .iter()
        .map(|mb: &Mailbox| mb.phrase().to_string())
        .collect();

    // Fixed pipeline order, independent of how the modifiers were written.
    if let Some(range) = code.range {
        items = range.apply(items);
    }
    if code.fold {
        items = items.iter().map(|s| s.to_lowercase()).collect();
    }
    if code.quote_strip {
        items = items.into_iter().map(strip_quotes).collect();
    }
    if let Some(replacement) = code.space_replace {
        items = items
            .iter()
            .map(|s| s.replace(' ', &replacement.to_string()))
            .collect();
    }
    join(items, code.join)
}

fn strip_quotes(s: String) -> String {
    let trimmed = s
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string);
    trimmed.unwrap_or(s)
}

fn eval_numeric(code: &NumericCode, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
    let value = numeric_value(code.kind, ctx)?;
    let text = value.to_string();

    let width = match code.width {
        Width::None => None,
        Width::Fixed(w) => Some(w as usize),
        Width::Auto => Some(decimal_width(category_max(code.kind, ctx)?)),
    };

    // Padding only happens when a fill character was given; a bare width is
    // accepted but inert (see DESIGN.md: the reference filename example
    // shows an unpadded serial).
    let (Some(width), Some(fill)) = (width, code.fill) else {
        return Ok(text);
    };
    if text.len() >= width {
        return Ok(text);
    }
    let pad: String = std::iter::repeat(fill).take(width - text.len()).collect();
    Ok(if code.left_adjust {
        format!("{text}{pad}")
    } else {
        format!("{pad}{text}")
    })
}

fn numeric_value(kind: NumericKind, ctx: &RenderContext<'_>) -> Result<u32, RenderError> {
    match kind {
        NumericKind::PageNumber => Ok(ctx.page.map_or(SENTINEL_PAGE_NUMBER, |p| p.number)),
        NumericKind::PageCount => Ok(ctx.page.map_or(SENTINEL_PAGE_COUNT, |p| p.count)),
        NumericKind::BoxCount => {
            let index = ctx.index.ok_or(RenderError::NoFolderIndex)?;
            Ok(index.box_count())
        }
        NumericKind::DaySerial | NumericKind::DayCount | NumericKind::BoxSerial => {
            let index = ctx.index.ok_or(RenderError::NoFolderIndex)?;
            let lookup = match kind {
                NumericKind::DaySerial => index.day_serial(ctx.message),
                NumericKind::DayCount => index.day_count(ctx.message),
                _ => index.box_serial(ctx.message),
            };
            lookup.ok_or(RenderError::MessageNotIndexed)
        }
    }
}

/// Maximum value of a numeric category, for auto width
fn category_max(kind: NumericKind, ctx: &RenderContext<'_>) -> Result<u32, RenderError> {
    match kind {
        NumericKind::PageNumber | NumericKind::PageCount => {
            Ok(ctx.page.map_or(SENTINEL_PAGE_COUNT, |p| p.count))
        }
        NumericKind::DaySerial | NumericKind::DayCount => {
            let index = ctx.index.ok_or(RenderError::NoFolderIndex)?;
            Ok(index.max_day_count())
        }
        NumericKind::BoxSerial | NumericKind::BoxCount => {
            let index = ctx.index.ok_or(RenderError::NoFolderIndex)?;
            Ok(index.box_count())
        }
    }
}

fn decimal_width(value: u32) -> usize {
    value.to_string().len()
}
