//! mailpress-core - Message model, template compiler and folder index
//!
//! This crate holds the format-independent half of mailpress:
//! - **message** - the closed message adapter (headers, addresses, body tree)
//! - **source** - mail folder reading (mbox files, directories of `.eml`)
//! - **format** - the template mini-language compiler and renderer
//! - **index** - per-(folder, locale, timezone) ordering, serials and
//!   format-evaluation caching
//!
//! ## Examples
//!
//! Compile a filename template and render it for every message of a folder:
//!
//! ```rust,no_run
//! use mailpress_core::{
//!     FormatProgram, IndexKey, IndexRegistry, RenderContext, read_folder,
//! };
//! use chrono::Locale;
//! use chrono_tz::Tz;
//! use std::path::PathBuf;
//!
//! let folder = PathBuf::from("inbox.mbox");
//! let messages = read_folder(&folder)?;
//!
//! let mut registry = IndexRegistry::new();
//! let index = registry.get_or_build(
//!     IndexKey { folder, locale: "POSIX".into(), timezone: "UTC".into() },
//!     Locale::POSIX,
//!     Tz::UTC,
//!     || messages,
//! );
//!
//! let name = FormatProgram::compile("%Y-%m-%d_@n_@F")?;
//! assert!(index.is_unique(&name)?);
//! for msg in index.messages() {
//!     let ctx = RenderContext::new(Locale::POSIX, Tz::UTC, msg).with_index(&index);
//!     println!("{}", name.render(&ctx)?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Render context binding a message to locale, timezone and collaborators
pub mod context;
/// Error types
pub mod error;
/// Template mini-language compiler
pub mod format;
/// Folder index and registry
pub mod index;
/// Closed message model
pub mod message;
/// Mail folder reading
pub mod source;

pub use context::{PageRefs, RenderContext, SENTINEL_PAGE_COUNT, SENTINEL_PAGE_NUMBER};
pub use error::{RenderError, SourceError, TemplateError};
pub use format::{FormatFlags, FormatProgram};
pub use index::{FolderIndex, IndexKey, IndexRegistry};
pub use message::{AddrField, Attachment, BodyPart, Header, Mailbox, Message};
pub use source::{parse_message, read_folder};
