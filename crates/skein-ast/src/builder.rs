//! Arena-backed construction of syntax trees.
//!
//! Parser adapters and tests build trees through [`AstBuilder`] instead of
//! spelling out node structs. Nodes get the builder's current line, set with
//! [`AstBuilder::at`].
//!
//! ```
//! use bumpalo::Bump;
//! use skein_ast::AstBuilder;
//!
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena);
//! let sum = b.binary(b.number("1"), "+", b.number("2"));
//! let script = b.script(&["x"], &[b.stmt(b.assign("x", sum)), b.answer(b.reference("x"))]);
//! assert_eq!(script.statements().len(), 2);
//! ```

use std::cell::Cell;

use bumpalo::Bump;
use skein_core::Span;

use crate::ast::*;

/// Allocates syntax nodes in an arena.
pub struct AstBuilder<'ast> {
    arena: &'ast Bump,
    line: Cell<u32>,
}

impl<'ast> AstBuilder<'ast> {
    /// Create a builder that allocates in `arena`, starting at line 1.
    pub fn new(arena: &'ast Bump) -> Self {
        Self {
            arena,
            line: Cell::new(1),
        }
    }

    /// Set the line given to subsequently built nodes.
    pub fn at(&self, line: u32) -> &Self {
        self.line.set(line);
        self
    }

    /// Span covering the current line.
    pub fn span(&self) -> Span {
        Span::line(self.line.get())
    }

    /// Identifier allocated in the arena.
    pub fn ident(&self, name: &str) -> Ident<'ast> {
        Ident::new(self.arena.alloc_str(name), self.span())
    }

    // ==========================================================================
    // Literals and variables
    // ==========================================================================

    /// Literal of any kind.
    pub fn literal(&self, kind: LiteralKind, text: &str) -> Expr<'ast> {
        Expr::Literal(LiteralExpr {
            kind,
            text: self.arena.alloc_str(text),
            span: self.span(),
        })
    }

    /// Number literal.
    pub fn number(&self, text: &str) -> Expr<'ast> {
        self.literal(LiteralKind::Number, text)
    }

    /// Character literal.
    pub fn character(&self, text: &str) -> Expr<'ast> {
        self.literal(LiteralKind::Character, text)
    }

    /// String literal, given without quotes.
    pub fn string(&self, text: &str) -> Expr<'ast> {
        self.literal(LiteralKind::String, text)
    }

    /// Symbol literal, given without `#`.
    pub fn symbol(&self, text: &str) -> Expr<'ast> {
        self.literal(LiteralKind::Symbol, text)
    }

    /// Literal array, given as its element text.
    pub fn literal_array(&self, text: &str) -> Expr<'ast> {
        self.literal(LiteralKind::Array, text)
    }

    /// Pseudo-variable.
    pub fn pseudo(&self, kind: PseudoKind) -> Expr<'ast> {
        Expr::Pseudo(PseudoExpr {
            kind,
            span: self.span(),
        })
    }

    /// `self`
    pub fn self_ref(&self) -> Expr<'ast> {
        self.pseudo(PseudoKind::SelfRef)
    }

    /// `super`
    pub fn super_ref(&self) -> Expr<'ast> {
        self.pseudo(PseudoKind::Super)
    }

    /// `nil`
    pub fn nil(&self) -> Expr<'ast> {
        self.pseudo(PseudoKind::Nil)
    }

    /// Variable or global reference.
    pub fn reference(&self, name: &str) -> Expr<'ast> {
        Expr::Reference(self.ident(name))
    }

    // ==========================================================================
    // Messages
    // ==========================================================================

    /// Unary message.
    pub fn unary_message(&self, selector: &str) -> Message<'ast> {
        Message::Unary(UnaryMessage {
            selector: self.ident(selector),
        })
    }

    /// Binary message.
    pub fn binary_message(&self, selector: &str, argument: Expr<'ast>) -> Message<'ast> {
        Message::Binary(BinaryMessage {
            selector: self.ident(selector),
            argument,
            span: self.span(),
        })
    }

    /// Keyword message from `(keyword, argument)` pairs.
    pub fn keyword_message(&self, parts: &[(&str, Expr<'ast>)]) -> Message<'ast> {
        let parts: Vec<KeywordPart<'ast>> = parts
            .iter()
            .map(|(keyword, argument)| KeywordPart {
                keyword: self.ident(keyword),
                argument: *argument,
            })
            .collect();
        Message::Keyword(KeywordMessage {
            parts: self.arena.alloc_slice_copy(&parts),
            span: self.span(),
        })
    }

    /// Send `message` to `receiver`.
    pub fn send(&self, receiver: Expr<'ast>, message: Message<'ast>) -> Expr<'ast> {
        Expr::Send(self.arena.alloc(SendExpr {
            receiver,
            message,
            span: self.span(),
        }))
    }

    /// `receiver selector`
    pub fn unary(&self, receiver: Expr<'ast>, selector: &str) -> Expr<'ast> {
        self.send(receiver, self.unary_message(selector))
    }

    /// `receiver op argument`
    pub fn binary(&self, receiver: Expr<'ast>, selector: &str, argument: Expr<'ast>) -> Expr<'ast> {
        self.send(receiver, self.binary_message(selector, argument))
    }

    /// `receiver k1: a1 k2: a2 ...`
    pub fn keyword(&self, receiver: Expr<'ast>, parts: &[(&str, Expr<'ast>)]) -> Expr<'ast> {
        self.send(receiver, self.keyword_message(parts))
    }

    /// `receiver m1; m2; ...`
    pub fn cascade(&self, receiver: Expr<'ast>, messages: &[Message<'ast>]) -> Expr<'ast> {
        Expr::Cascade(self.arena.alloc(CascadeExpr {
            receiver,
            messages: self.arena.alloc_slice_copy(messages),
            span: self.span(),
        }))
    }

    // ==========================================================================
    // Compound expressions
    // ==========================================================================

    /// `target := value`
    pub fn assign(&self, target: &str, value: Expr<'ast>) -> Expr<'ast> {
        Expr::Assign(self.arena.alloc(AssignExpr {
            target: self.ident(target),
            value,
            span: self.span(),
        }))
    }

    /// `(expr)`
    pub fn paren(&self, expr: Expr<'ast>) -> Expr<'ast> {
        Expr::Paren(self.arena.alloc(ParenExpr {
            expr,
            span: self.span(),
        }))
    }

    /// `<primitive: number>`
    pub fn primitive(&self, number: &str) -> Expr<'ast> {
        Expr::Primitive(PrimitiveExpr {
            number: self.arena.alloc_str(number),
            span: self.span(),
        })
    }

    /// Block literal.
    pub fn block(
        &self,
        params: &[&str],
        temporaries: &[&str],
        statements: &[Statement<'ast>],
    ) -> Expr<'ast> {
        let params = self.idents(params);
        let body = self.sequence(temporaries, statements);
        Expr::Block(self.arena.alloc(BlockExpr {
            params,
            body,
            span: self.span(),
        }))
    }

    // ==========================================================================
    // Statements
    // ==========================================================================

    /// Expression statement.
    pub fn stmt(&self, expr: Expr<'ast>) -> Statement<'ast> {
        Statement::Expression(expr)
    }

    /// `^expr`
    pub fn answer(&self, value: Expr<'ast>) -> Statement<'ast> {
        Statement::Answer(AnswerStmt {
            value,
            span: self.span(),
        })
    }

    /// Temporaries plus statements.
    pub fn sequence(&self, temporaries: &[&str], statements: &[Statement<'ast>]) -> Sequence<'ast> {
        Sequence {
            temporaries: self.idents(temporaries),
            statements: self.arena.alloc_slice_copy(statements),
            span: self.span(),
        }
    }

    /// Whole compilation unit.
    pub fn script(&self, temporaries: &[&str], statements: &[Statement<'ast>]) -> Script<'ast> {
        Script::new(self.sequence(temporaries, statements), self.span())
    }

    fn idents(&self, names: &[&str]) -> &'ast [Ident<'ast>] {
        let idents: Vec<Ident<'ast>> = names.iter().map(|name| self.ident(name)).collect();
        self.arena.alloc_slice_copy(&idents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_take_current_line() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let first = b.number("1");
        let second = b.at(7).reference("x");
        assert_eq!(first.span().line, 1);
        assert_eq!(second.span().line, 7);
    }

    #[test]
    fn block_keeps_parameter_spelling() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let Expr::Block(block) = b.block(&[":each"], &[], &[b.stmt(b.reference("each"))]) else {
            panic!("expected block");
        };
        assert_eq!(block.params[0].name, ":each");
        assert_eq!(block.body.statements.len(), 1);
    }

    #[test]
    fn answer_statement_is_detected() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let seq = b.sequence(&[], &[b.stmt(b.number("1")), b.answer(b.number("2"))]);
        assert!(seq.answers());
        assert!(!b.sequence(&[], &[b.stmt(b.nil())]).answers());
    }

    #[test]
    fn cascade_shares_receiver() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let cascade = b.cascade(
            b.reference("Transcript"),
            &[
                b.keyword_message(&[("show:", b.string("a"))]),
                b.unary_message("cr"),
            ],
        );
        let Expr::Cascade(cascade) = cascade else {
            panic!("expected cascade");
        };
        assert_eq!(cascade.messages.len(), 2);
        assert_eq!(cascade.messages[0].selector(), "show:");
    }
}
