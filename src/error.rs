//! Error types shared across the crate.
//!
//! [`ParseError`] carries the byte position and a short context snippet of the
//! offending input; [`CladeError`] is what every public operation returns.

use std::path::PathBuf;
use thiserror::Error;

/// Number of bytes shown on each side of the error position.
const CONTEXT_RADIUS: usize = 20;

/// What went wrong while reading tree or clade-list text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedEnd,
    UnbalancedParentheses,
    EmptyLabel,
    UnexpectedChar(char),
    InvalidBranchLength(String),
    UnclosedComment,
    UnclosedQuote,
    TrailingContent,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorKind::UnexpectedEnd => write!(f, "unexpected end of input"),
            ParseErrorKind::UnbalancedParentheses => write!(f, "unbalanced parentheses"),
            ParseErrorKind::EmptyLabel => write!(f, "empty taxon name"),
            ParseErrorKind::UnexpectedChar(c) => write!(f, "unexpected character '{c}'"),
            ParseErrorKind::InvalidBranchLength(s) => write!(f, "invalid branch length '{s}'"),
            ParseErrorKind::UnclosedComment => write!(f, "unclosed comment"),
            ParseErrorKind::UnclosedQuote => write!(f, "unclosed quoted label"),
            ParseErrorKind::TrailingContent => write!(f, "trailing content after ';'"),
        }
    }
}

/// Parsing error with contextual information (position and surrounding text).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at byte {position}{} near \"{context}\"", line_suffix(.line))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Byte offset into the whole source.
    pub position: usize,
    /// 1-based line number, set when the source is read line by line.
    pub line: Option<usize>,
    pub context: String,
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|n| format!(" (line {n})")).unwrap_or_default()
}

impl ParseError {
    /// Build an error for `kind` at `position` of `input`.
    pub fn at(kind: ParseErrorKind, input: &str, position: usize) -> Self {
        let position = position.min(input.len());
        let start = floor_char_boundary(input, position.saturating_sub(CONTEXT_RADIUS));
        let end = floor_char_boundary(input, (position + CONTEXT_RADIUS).min(input.len()));
        Self {
            kind,
            position,
            line: None,
            context: input[start..end].to_string(),
        }
    }

    /// Relocate an error raised on a single line to its place in the source.
    pub fn in_line(mut self, line: usize, line_start: usize) -> Self {
        self.position += line_start;
        self.line = Some(line);
        self
    }
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Errors raised while building a clade corpus.
#[derive(Debug, Error)]
pub enum CladeError {
    /// A name was looked up after the universe was frozen without ever being seen.
    #[error("unknown taxon '{0}'")]
    UnknownTaxon(String),

    #[error("taxon index {index} out of range for a universe of {size} taxa")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The full-universe clade ended up with no members.
    #[error("no clades found: the taxon universe is empty")]
    EmptyUniverse,

    #[error("enhancement gap bound must be positive, got {0}")]
    InvalidGapBound(usize),

    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
