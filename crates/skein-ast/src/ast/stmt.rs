//! Statement sequences.

use crate::ast::{Expr, Ident};
use skein_core::Span;

/// A statement sequence with its temporaries: `| a b | stmt. stmt. ^expr`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sequence<'ast> {
    /// Temporaries declared between bars.
    pub temporaries: &'ast [Ident<'ast>],
    /// Statements in source order.
    pub statements: &'ast [Statement<'ast>],
    /// Source location
    pub span: Span,
}

impl<'ast> Sequence<'ast> {
    /// A sequence with no temporaries and no statements.
    pub fn empty(span: Span) -> Self {
        Self {
            temporaries: &[],
            statements: &[],
            span,
        }
    }

    /// Whether any direct statement of the sequence is an answer.
    pub fn answers(&self) -> bool {
        self.statements
            .iter()
            .any(|stmt| matches!(stmt, Statement::Answer(_)))
    }
}

/// A single statement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statement<'ast> {
    /// An expression evaluated for its value.
    Expression(Expr<'ast>),
    /// `^expr`: return the value from the enclosing method.
    Answer(AnswerStmt<'ast>),
}

impl<'ast> Statement<'ast> {
    /// Get the span of this statement.
    pub fn span(&self) -> Span {
        match self {
            Self::Expression(expr) => expr.span(),
            Self::Answer(answer) => answer.span,
        }
    }
}

/// `^expr`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerStmt<'ast> {
    /// The answered value.
    pub value: Expr<'ast>,
    /// Location of the caret.
    pub span: Span,
}
