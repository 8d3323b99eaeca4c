//! Source location tracking for diagnostics and line tables.
//!
//! Provides [`Span`] to track where syntax nodes and errors occur in source code.

use std::fmt;

/// A span of source code, represented by its starting position.
///
/// The line is what ends up in the generated `LineNumberTable`; the column and
/// length only serve error messages.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Line number (1-indexed, 0 for synthesized code).
    pub line: u32,
    /// Column number (1-indexed, byte-based).
    pub col: u32,
    /// Length in bytes.
    pub len: u32,
}

impl Span {
    /// Create a new span from a line, column, and length.
    #[inline]
    pub fn new(line: u32, col: u32, len: u32) -> Self {
        Self { line, col, len }
    }

    /// A zero-length span covering a whole line.
    #[inline]
    pub fn line(line: u32) -> Self {
        Self { line, col: 1, len: 0 }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
