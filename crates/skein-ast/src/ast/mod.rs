//! Abstract syntax tree for one Smalltalk compilation unit.
//!
//! All nodes borrow from an arena and stay valid for the arena's lifetime.
//!
//! ```text
//! Script
//! └── Sequence            | temps | statements
//!     └── Statement       expression or ^answer
//!         └── Expr        literal, variable, block, send, cascade, assignment ...
//! ```

pub mod expr;
pub mod stmt;

pub use expr::*;
pub use stmt::*;

use skein_core::Span;

/// An identifier with its source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'ast> {
    /// The identifier text. Block parameters may keep their leading `:`.
    pub name: &'ast str,
    /// Source location
    pub span: Span,
}

impl<'ast> Ident<'ast> {
    /// Create an identifier.
    pub fn new(name: &'ast str, span: Span) -> Self {
        Self { name, span }
    }
}

/// A parsed compilation unit: the body of one class or script file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Script<'ast> {
    /// Top-level temporaries and statements.
    pub body: Sequence<'ast>,
    /// Source location
    pub span: Span,
}

impl<'ast> Script<'ast> {
    /// Create a script from its top-level sequence.
    pub fn new(body: Sequence<'ast>, span: Span) -> Self {
        Self { body, span }
    }

    /// Top-level statements.
    pub fn statements(&self) -> &'ast [Statement<'ast>] {
        self.body.statements
    }

    /// Whether the script contains no statements.
    pub fn is_empty(&self) -> bool {
        self.body.statements.is_empty()
    }
}
