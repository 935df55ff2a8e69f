//! Render context for compiled format programs
//!
//! A context binds one message to a locale and timezone, plus the optional
//! collaborators a code may need: a folder index for serial codes and page
//! references for page codes. Absence of an optional collaborator is a
//! defined render-time condition, not a compile-time error — serial codes
//! fail with [`RenderError::NoFolderIndex`](crate::error::RenderError),
//! page codes fall back to sentinel values.

use crate::index::FolderIndex;
use crate::message::Message;
use chrono::{DateTime, Locale, Utc};
use chrono_tz::Tz;

/// Sentinel rendered for a page-number code when no page refs are bound
pub const SENTINEL_PAGE_NUMBER: u32 = 998;
/// Sentinel rendered for a page-count code when no page refs are bound
pub const SENTINEL_PAGE_COUNT: u32 = 999;

/// Resolved page references, bound during the pagination finalize pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRefs {
    /// 1-based page number
    pub number: u32,
    /// Total pages in the document
    pub count: u32,
}

/// Everything a format code may draw on while rendering
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    /// Locale for month/weekday names
    pub locale: Locale,
    /// Timezone date/time codes render in
    pub tz: Tz,
    /// The message being rendered
    pub message: &'a Message,
    /// Folder index backing serial codes, when available
    pub index: Option<&'a FolderIndex>,
    /// Page references, bound only during the finalize pass
    pub page: Option<PageRefs>,
}

impl<'a> RenderContext<'a> {
    /// Context with neither folder index nor page refs
    #[must_use]
    pub fn new(locale: Locale, tz: Tz, message: &'a Message) -> Self {
        Self {
            locale,
            tz,
            message,
            index: None,
            page: None,
        }
    }

    /// Attach a folder index, enabling serial codes
    #[must_use]
    pub fn with_index(mut self, index: &'a FolderIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Bind page references, enabling exact page codes
    #[must_use]
    pub fn with_page(mut self, page: PageRefs) -> Self {
        self.page = Some(page);
        self
    }

    /// Message timestamp in the context timezone
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Tz> {
        DateTime::<Utc>::from_timestamp(self.message.timestamp, 0)
            .unwrap_or_default()
            .with_timezone(&self.tz)
    }
}

impl std::fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("tz", &self.tz)
            .field("timestamp", &self.message.timestamp)
            .field("has_index", &self.index.is_some())
            .field("page", &self.page)
            .finish()
    }
}
