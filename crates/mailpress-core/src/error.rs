//! Error types for the mailpress core crate

use std::io;
use thiserror::Error;

/// Result type for template compilation
pub type CompileResult<T> = std::result::Result<T, TemplateError>;

/// Errors raised while compiling a format template.
///
/// Compilation is all-or-nothing: any of these aborts the compile and no
/// partial program is produced.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Templates are single-line
    #[error("template contains an embedded line break")]
    EmbeddedNewline,

    /// `%` escape that is not a recognized date/time code
    #[error("unknown date/time escape '%{0}'")]
    UnknownDateCode(String),

    /// `%{word}` with an unrecognized word
    #[error("unknown date/time word '%{{{0}}}'")]
    UnknownDateWord(String),

    /// `@` escape ending in a letter that selects nothing
    #[error("unknown selector '@{0}'")]
    UnknownSelector(char),

    /// Modifier that the selected code family does not accept
    #[error("modifier '{modifier}' is not valid for '@{selector}'")]
    BadModifier { modifier: char, selector: char },

    /// `%{...` or `@{...` without a closing brace
    #[error("unterminated '{{' in escape")]
    UnterminatedBrace,

    /// Template ends in the middle of an escape
    #[error("template ends inside an escape")]
    TrailingEscape,
}

/// Errors raised while rendering a compiled program.
///
/// A code whose data source is absent from the render context is a defined
/// failure at render time, never a compile-time error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    /// A folder-serial code was rendered without a folder index
    #[error("format code needs a folder index but none is attached")]
    NoFolderIndex,

    /// The context message is not part of the attached folder index
    #[error("message is not part of the attached folder index")]
    MessageNotIndexed,
}

/// Errors raised while reading a mail folder
#[derive(Debug, Error)]
pub enum SourceError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Folder path is neither an mbox file nor a directory
    #[error("not a mail folder: {0}")]
    NotAFolder(String),

    /// Folder contained no parseable messages
    #[error("no messages found in {0}")]
    NoMessages(String),
}
