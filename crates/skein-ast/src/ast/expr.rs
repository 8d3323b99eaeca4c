//! Expression nodes.
//!
//! Message precedence is already resolved by the parser: a [`SendExpr`]
//! holds exactly one message, so `a foo + b bar: c` arrives as
//! `Send(Send(Send(a, foo), + Send(b, ...)), bar: c)`.

use crate::ast::{Ident, Sequence};
use skein_core::Span;

/// An expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expr<'ast> {
    /// Literal value
    Literal(LiteralExpr<'ast>),
    /// `self`, `super`, `nil`, `true` or `false`
    Pseudo(PseudoExpr),
    /// Variable or global reference
    Reference(Ident<'ast>),
    /// Block literal
    Block(&'ast BlockExpr<'ast>),
    /// Single message send
    Send(&'ast SendExpr<'ast>),
    /// Several messages to one receiver
    Cascade(&'ast CascadeExpr<'ast>),
    /// `name := value`
    Assign(&'ast AssignExpr<'ast>),
    /// Parenthesized expression
    Paren(&'ast ParenExpr<'ast>),
    /// `<primitive: n>` pragma
    Primitive(PrimitiveExpr<'ast>),
}

impl<'ast> Expr<'ast> {
    /// Get the span of this expression.
    pub fn span(&self) -> Span {
        match self {
            Self::Literal(e) => e.span,
            Self::Pseudo(e) => e.span,
            Self::Reference(e) => e.span,
            Self::Block(e) => e.span,
            Self::Send(e) => e.span,
            Self::Cascade(e) => e.span,
            Self::Assign(e) => e.span,
            Self::Paren(e) => e.span,
            Self::Primitive(e) => e.span,
        }
    }

    /// The identifier when this is a plain reference.
    pub fn as_reference(&self) -> Option<&Ident<'ast>> {
        match self {
            Self::Reference(ident) => Some(ident),
            _ => None,
        }
    }
}

/// A literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiteralExpr<'ast> {
    /// The literal kind
    pub kind: LiteralKind,
    /// Source text: digits, the character, string contents without quotes,
    /// symbol text without `#`, or the literal array's elements.
    pub text: &'ast str,
    /// Source location
    pub span: Span,
}

/// The kind of literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    /// `42`, `16r1F`, `3.14`
    Number,
    /// `$a`
    Character,
    /// `'text'`
    String,
    /// `#foo`, `#at:put:`
    Symbol,
    /// `#(1 $a foo)`
    Array,
}

/// A pseudo-variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PseudoExpr {
    /// Which pseudo-variable
    pub kind: PseudoKind,
    /// Source location
    pub span: Span,
}

/// The pseudo-variables of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoKind {
    /// `self`
    SelfRef,
    /// `super`
    Super,
    /// `nil`
    Nil,
    /// `true`
    True,
    /// `false`
    False,
}

/// A block literal `[:a :b | | t | statements]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockExpr<'ast> {
    /// Parameters, possibly spelled with their leading colon
    pub params: &'ast [Ident<'ast>],
    /// Body
    pub body: Sequence<'ast>,
    /// Source location
    pub span: Span,
}

/// A receiver and one message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SendExpr<'ast> {
    /// Receiver
    pub receiver: Expr<'ast>,
    /// Message sent to it
    pub message: Message<'ast>,
    /// Source location
    pub span: Span,
}

/// `receiver msg1; msg2; ...`
///
/// Every message goes to the same receiver; the last result is the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeExpr<'ast> {
    /// The shared receiver
    pub receiver: Expr<'ast>,
    /// Messages in order, at least two
    pub messages: &'ast [Message<'ast>],
    /// Source location
    pub span: Span,
}

/// `target := value`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignExpr<'ast> {
    /// Assigned variable
    pub target: Ident<'ast>,
    /// Value
    pub value: Expr<'ast>,
    /// Source location
    pub span: Span,
}

/// `(expr)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParenExpr<'ast> {
    /// Inner expression
    pub expr: Expr<'ast>,
    /// Source location
    pub span: Span,
}

/// `<primitive: 60>`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveExpr<'ast> {
    /// Primitive number as written
    pub number: &'ast str,
    /// Source location
    pub span: Span,
}

/// A message: selector plus arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message<'ast> {
    /// `foo`
    Unary(UnaryMessage<'ast>),
    /// `+ arg`
    Binary(BinaryMessage<'ast>),
    /// `at: a put: b`
    Keyword(KeywordMessage<'ast>),
}

impl<'ast> Message<'ast> {
    /// Get the span of this message.
    pub fn span(&self) -> Span {
        match self {
            Self::Unary(m) => m.selector.span,
            Self::Binary(m) => m.span,
            Self::Keyword(m) => m.span,
        }
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        match self {
            Self::Unary(_) => 0,
            Self::Binary(_) => 1,
            Self::Keyword(m) => m.parts.len(),
        }
    }

    /// The full selector, `at:put:` for keyword messages.
    pub fn selector(&self) -> String {
        match self {
            Self::Unary(m) => m.selector.name.to_string(),
            Self::Binary(m) => m.selector.name.to_string(),
            Self::Keyword(m) => m.selector(),
        }
    }
}

/// `receiver selector`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnaryMessage<'ast> {
    /// The selector
    pub selector: Ident<'ast>,
}

/// `receiver op argument`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryMessage<'ast> {
    /// The operator
    pub selector: Ident<'ast>,
    /// Right-hand argument
    pub argument: Expr<'ast>,
    /// Source location
    pub span: Span,
}

/// `receiver key1: a key2: b`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordMessage<'ast> {
    /// Keyword/argument pairs in order
    pub parts: &'ast [KeywordPart<'ast>],
    /// Source location
    pub span: Span,
}

impl<'ast> KeywordMessage<'ast> {
    /// Concatenated keywords, e.g. `at:put:`.
    pub fn selector(&self) -> String {
        self.parts.iter().map(|part| part.keyword.name).collect()
    }
}

/// One `keyword: argument` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordPart<'ast> {
    /// Keyword including its colon
    pub keyword: Ident<'ast>,
    /// Argument expression
    pub argument: Expr<'ast>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_selector_concatenates_parts() {
        let one = Expr::Literal(LiteralExpr {
            kind: LiteralKind::Number,
            text: "1",
            span: Span::line(1),
        });
        let parts = [
            KeywordPart {
                keyword: Ident::new("at:", Span::line(1)),
                argument: one,
            },
            KeywordPart {
                keyword: Ident::new("put:", Span::line(1)),
                argument: one,
            },
        ];
        let message = Message::Keyword(KeywordMessage {
            parts: &parts,
            span: Span::line(1),
        });
        assert_eq!(message.selector(), "at:put:");
        assert_eq!(message.arity(), 2);
    }

    #[test]
    fn unary_has_no_arguments() {
        let message = Message::Unary(UnaryMessage {
            selector: Ident::new("size", Span::new(2, 4, 4)),
        });
        assert_eq!(message.arity(), 0);
        assert_eq!(message.span(), Span::new(2, 4, 4));
    }
}
